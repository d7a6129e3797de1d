//! OpenAI client for drawing analysis, script writing and illustration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nocomelon_models::{DrawingAnalysis, Scene, StoryScript};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GenAiError, GenAiResult};
use crate::metrics::record_call;
use crate::prompts::{story_prompt, STORY_SYSTEM_PROMPT, VISION_SYSTEM_PROMPT, VISION_USER_PROMPT};
use crate::traits::{DrawingAnalyzer, Illustrator, StoryPrompt, StoryWriter};

const PROVIDER: &str = "openai";

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `OPENAI_API_KEY` plus optional `OPENAI_BASE_URL`,
    /// `OPENAI_CHAT_MODEL`, `OPENAI_IMAGE_MODEL` and `OPENAI_TIMEOUT_SECS`.
    pub fn from_env() -> GenAiResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenAiError::not_configured("OPENAI_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENAI_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = std::env::var("OPENAI_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(secs) = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'static str,
    n: u8,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

/// Script as returned by the model, before normalization.
#[derive(Debug, Deserialize)]
struct ScriptDraft {
    #[serde(default)]
    title: Option<String>,
    scenes: Vec<Scene>,
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> GenAiResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> GenAiResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn chat_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        messages: Vec<ChatMessage>,
    ) -> GenAiResult<T> {
        let start = Instant::now();
        let result = self.chat_json_inner(messages).await;
        record_call(PROVIDER, operation, result.is_ok(), start.elapsed());
        result
    }

    async fn chat_json_inner<T: DeserializeOwned>(
        &self,
        messages: Vec<ChatMessage>,
    ) -> GenAiResult<T> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenAiError::from_response(PROVIDER, response).await);
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenAiError::invalid_response(PROVIDER, "no content in chat response"))?;

        serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| GenAiError::invalid_response(PROVIDER, format!("malformed JSON: {}", e)))
    }

    async fn download(&self, url: &str) -> GenAiResult<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GenAiError::from_response(PROVIDER, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn generate_image(&self, prompt: &str) -> GenAiResult<Vec<u8>> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            size: &self.config.image_size,
            quality: "standard",
            n: 1,
            response_format: "b64_json",
        };

        let response = self
            .http
            .post(self.url("images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenAiError::from_response(PROVIDER, response).await);
        }

        let body: ImageResponse = response.json().await?;
        let image = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GenAiError::invalid_response(PROVIDER, "no image in response"))?;

        match (image.b64_json, image.url) {
            (Some(encoded), _) => BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| GenAiError::invalid_response(PROVIDER, format!("bad base64 image: {}", e))),
            (None, Some(url)) => self.download(&url).await,
            (None, None) => Err(GenAiError::invalid_response(PROVIDER, "image has neither data nor url")),
        }
    }
}

#[async_trait]
impl DrawingAnalyzer for OpenAiClient {
    async fn analyze(&self, image_base64: &str) -> GenAiResult<DrawingAnalysis> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(VISION_SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/png;base64,{}", image_base64),
                        },
                    },
                    ContentPart::Text {
                        text: VISION_USER_PROMPT.to_string(),
                    },
                ]),
            },
        ];

        let drawing: DrawingAnalysis = self.chat_json("analyze_drawing", messages).await?;
        info!(subject = %drawing.subject, "Drawing analyzed");
        Ok(drawing)
    }
}

#[async_trait]
impl StoryWriter for OpenAiClient {
    async fn write_story(&self, prompt: &StoryPrompt) -> GenAiResult<StoryScript> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(STORY_SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Text(story_prompt(prompt)),
            },
        ];

        let draft: ScriptDraft = self.chat_json("write_story", messages).await?;
        let script = StoryScript::new(draft.title, draft.scenes).normalized();
        script
            .validate_numbering()
            .map_err(|e| GenAiError::invalid_response(PROVIDER, e.to_string()))?;

        info!(scenes = script.total_scenes, "Story written");
        Ok(script)
    }
}

#[async_trait]
impl Illustrator for OpenAiClient {
    async fn illustrate(&self, prompt: &str) -> GenAiResult<Vec<u8>> {
        let start = Instant::now();
        let result = self.generate_image(prompt).await;
        record_call(PROVIDER, "illustrate", result.is_ok(), start.elapsed());
        if let Ok(bytes) = &result {
            debug!(bytes = bytes.len(), "Image generated");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocomelon_models::{Theme, VoiceType};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = format!("{}/v1", server.uri());
        OpenAiClient::new(config).unwrap()
    }

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    fn drawing() -> DrawingAnalysis {
        DrawingAnalysis {
            subject: "a purple dragon".into(),
            setting: "a meadow".into(),
            details: vec![],
            mood: "happy".into(),
            colors: vec![],
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_analyze_sends_image_and_parses_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(chat_reply(
                r#"{"subject":"a purple dragon","setting":"a meadow","details":["wings"],"mood":"happy","colors":["purple"]}"#,
            ))
            .mount(&server)
            .await;

        let drawing = client(&server).analyze("aGVsbG8=").await.unwrap();
        assert_eq!(drawing.subject, "a purple dragon");
        assert_eq!(drawing.colors, vec!["purple"]);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["messages"][1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[tokio::test]
    async fn test_story_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(chat_reply(
                "```json\n{\"title\":\"Dino Day\",\"scenes\":[{\"number\":2,\"text\":\"b\"},{\"number\":1,\"text\":\"a\"}]}\n```",
            ))
            .mount(&server)
            .await;

        let prompt = StoryPrompt {
            drawing: drawing(),
            theme: Theme::Adventure,
            child_age: 5,
            voice_type: VoiceType::Gentle,
            personal_context: None,
        };
        let script = client(&server).write_story(&prompt).await.unwrap();
        assert_eq!(script.title.as_deref(), Some("Dino Day"));
        assert_eq!(script.total_scenes, 2);
        assert_eq!(script.scenes[0].text, "a");
    }

    #[tokio::test]
    async fn test_story_with_gaps_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(chat_reply(
                r#"{"scenes":[{"number":1,"text":"a"},{"number":3,"text":"c"}]}"#,
            ))
            .mount(&server)
            .await;

        let prompt = StoryPrompt {
            drawing: drawing(),
            theme: Theme::Bedtime,
            child_age: 3,
            voice_type: VoiceType::Gentle,
            personal_context: None,
        };
        let err = client(&server).write_story(&prompt).await.unwrap_err();
        assert!(matches!(err, GenAiError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_illustrate_decodes_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_partial_json(json!({"model": "dall-e-3", "n": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": BASE64.encode(b"\x89PNG")}]
            })))
            .mount(&server)
            .await;

        let bytes = client(&server).illustrate("a dragon").await.unwrap();
        assert_eq!(bytes, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_api_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server).illustrate("a dragon").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("429"));
    }
}
