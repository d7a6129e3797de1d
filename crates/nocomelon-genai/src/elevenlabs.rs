//! ElevenLabs text-to-speech client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nocomelon_models::VoiceType;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{GenAiError, GenAiResult};
use crate::metrics::record_call;
use crate::traits::Narrator;

const PROVIDER: &str = "elevenlabs";

/// Voice id for each narrator option.
pub fn voice_id(voice: VoiceType) -> &'static str {
    match voice {
        VoiceType::Gentle => "EXAVITQu4vr4xnSDxMaL",
        VoiceType::Cheerful => "TxGEqnHWrfWFTfGW9XjX",
    }
}

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            model_id: "eleven_turbo_v2_5".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `ELEVENLABS_API_KEY` plus optional `ELEVENLABS_BASE_URL` and
    /// `ELEVENLABS_MODEL_ID`.
    pub fn from_env() -> GenAiResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenAiError::not_configured("ELEVENLABS_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("ELEVENLABS_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("ELEVENLABS_MODEL_ID") {
            config.model_id = model;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Clone)]
pub struct ElevenLabsClient {
    http: Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> GenAiResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> GenAiResult<Self> {
        Self::new(ElevenLabsConfig::from_env()?)
    }

    async fn speak(&self, text: &str, voice: VoiceType) -> GenAiResult<Vec<u8>> {
        let url = format!(
            "{}/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            voice_id(voice)
        );
        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenAiError::from_response(PROVIDER, response).await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenAiError::invalid_response(PROVIDER, "empty audio"));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Narrator for ElevenLabsClient {
    async fn narrate(&self, text: &str, voice: VoiceType) -> GenAiResult<Vec<u8>> {
        let start = Instant::now();
        let result = self.speak(text, voice).await;
        record_call(PROVIDER, "narrate", result.is_ok(), start.elapsed());
        if let Ok(bytes) = &result {
            debug!(voice = %voice, bytes = bytes.len(), "Narration generated");
        }
        result
    }
}
