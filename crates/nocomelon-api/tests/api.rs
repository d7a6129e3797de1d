//! Router tests against in-memory collaborators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use nocomelon_api::{create_router, ApiConfig, AppState, CheckpointBackend, Providers};
use nocomelon_firestore::MemoryStore;
use nocomelon_genai::{DrawingAnalyzer, GenAiResult, Illustrator, Narrator, StoryPrompt, StoryWriter};
use nocomelon_media::{MediaResult, MediaToolkit};
use nocomelon_models::{DrawingAnalysis, Scene, StoryScript, VoiceType};
use nocomelon_pipeline::{PipelineConfig, PipelineContext, PipelineController, PipelineExecutor};
use nocomelon_storage::{ArtifactStore, StorageConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn drawing() -> DrawingAnalysis {
    DrawingAnalysis {
        subject: "a purple dragon".into(),
        setting: "a meadow".into(),
        details: vec!["big wings".into()],
        mood: "happy".into(),
        colors: vec!["purple".into()],
    }
}

fn story() -> StoryScript {
    StoryScript {
        title: Some("The Purple Dragon".into()),
        scenes: vec![
            Scene {
                number: 1,
                text: "The dragon wakes up.".into(),
            },
            Scene {
                number: 2,
                text: "The dragon flies home.".into(),
            },
        ],
        total_scenes: 2,
    }
}

struct Fakes;

#[async_trait]
impl DrawingAnalyzer for Fakes {
    async fn analyze(&self, _image_base64: &str) -> GenAiResult<DrawingAnalysis> {
        Ok(drawing())
    }
}

#[async_trait]
impl StoryWriter for Fakes {
    async fn write_story(&self, _prompt: &StoryPrompt) -> GenAiResult<StoryScript> {
        Ok(story())
    }
}

#[async_trait]
impl Illustrator for Fakes {
    async fn illustrate(&self, _prompt: &str) -> GenAiResult<Vec<u8>> {
        Ok(b"\x89PNG".to_vec())
    }
}

#[async_trait]
impl Narrator for Fakes {
    async fn narrate(&self, _text: &str, _voice: VoiceType) -> GenAiResult<Vec<u8>> {
        Ok(b"ID3".to_vec())
    }
}

#[async_trait]
impl MediaToolkit for Fakes {
    async fn concat_audio(&self, _list_script: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"merged").await?;
        Ok(())
    }

    async fn render_slideshow(
        &self,
        _timeline_script: &Path,
        _narration: &Path,
        _music: Option<&Path>,
        output: &Path,
    ) -> MediaResult<()> {
        tokio::fs::write(output, b"video").await?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(3.0)
    }

    async fn extract_thumbnail(&self, _video: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }
}

struct TestApp {
    router: Router,
    _data: TempDir,
    _work: TempDir,
    // Held so the queue stays open when workers are not started.
    _executor: Option<PipelineExecutor>,
}

async fn build(start_workers: bool) -> TestApp {
    let data = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let storage = ArtifactStore::new(StorageConfig::local(data.path()))
        .await
        .unwrap();
    let store = Arc::new(MemoryStore::new());
    let fakes = Arc::new(Fakes);

    let ctx = Arc::new(PipelineContext {
        config: PipelineConfig {
            work_dir: work.path().to_path_buf(),
            ..PipelineConfig::default()
        },
        storage: Arc::new(storage),
        checkpoints: store.clone(),
        analyzer: fakes.clone(),
        writer: fakes.clone(),
        illustrator: fakes.clone(),
        narrator: fakes.clone(),
        toolkit: fakes,
    });
    let (controller, executor) = PipelineController::new(ctx);
    let executor = if start_workers {
        executor.spawn();
        None
    } else {
        Some(executor)
    };

    let config = ApiConfig {
        checkpoint_backend: CheckpointBackend::Memory,
        ..ApiConfig::default()
    };
    let state = AppState::new(config, controller, store, Providers::default());

    TestApp {
        router: create_router(state, None),
        _data: data,
        _work: work,
        _executor: executor,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Poll job status until the run leaves `processing`.
async fn wait_for_job(app: &TestApp, user: &str, run: &str) -> Value {
    for _ in 0..500 {
        let (status, body) = send(app, get(&format!("/api/v1/jobs/{run}/status?user_id={user}"))).await;
        if status == StatusCode::OK && body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {user}/{run} did not finish");
}

#[tokio::test]
async fn test_health() {
    let app = build(false).await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_status_reports_dependencies() {
    let app = build(false).await;
    let (status, body) = send(&app, get("/api/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["openai"], "missing");
    assert_eq!(body["elevenlabs"], "missing");
    assert_eq!(body["data_dir"], "writable");
    assert_eq!(body["storage"], "local");
    assert_eq!(body["checkpoints"], "ok");
    assert!(body["ffmpeg"] == "installed" || body["ffmpeg"] == "missing");
}

#[tokio::test]
async fn test_async_vision_requires_user() {
    let app = build(true).await;
    let (status, body) = send(
        &app,
        post("/api/v1/vision/analyze", json!({"image_base64": "aGVsbG8="})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["detail"].as_str().unwrap().contains("user_id"));
}

#[tokio::test]
async fn test_async_vision_then_poll() {
    let app = build(true).await;
    let (status, accepted) = send(
        &app,
        post(
            "/api/v1/vision/analyze",
            json!({"image_base64": "aGVsbG8=", "user_id": "alice"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "processing");
    assert_eq!(accepted["current_stage"], "vision");
    let run_id = accepted["run_id"].as_str().unwrap().to_string();
    assert_eq!(run_id.len(), 8);

    let job = wait_for_job(&app, "alice", &run_id).await;
    assert_eq!(job["status"], "complete");
    assert_eq!(job["current_stage"], "vision_complete");
    assert_eq!(job["drawing_analysis"]["subject"], "a purple dragon");
}

#[tokio::test]
async fn test_sync_vision_returns_analysis() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post("/api/v1/vision/analyze/sync", json!({"image_base64": "aGVsbG8="})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["drawing"]["mood"], "happy");
    assert!(body["run_id"].is_string());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = build(false).await;
    let (status, body) = send(&app, get("/api/v1/jobs/deadbeef/status?user_id=alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Job not found");
}

#[tokio::test]
async fn test_job_status_requires_user_query() {
    let app = build(false).await;
    let (status, body) = send(&app, get("/api/v1/jobs/deadbeef/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = build(false).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/story/generate/sync")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_sync_story() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post(
            "/api/v1/story/generate/sync",
            json!({
                "drawing": drawing(),
                "theme": "bedtime",
                "voice_type": "gentle",
                "child_age": 5
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "The Purple Dragon");
    assert_eq!(body["scenes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_story_rejects_out_of_range_age() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post(
            "/api/v1/story/generate/sync",
            json!({
                "drawing": drawing(),
                "theme": "bedtime",
                "voice_type": "gentle",
                "child_age": 12
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_sync_images_names_scene_files() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post(
            "/api/v1/images/generate",
            json!({"run_id": "run00001", "story": story(), "drawing": drawing()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(images[0]["key"].as_str().unwrap().ends_with("run00001_scene_1.png"));
    assert!(images[1]["key"].as_str().unwrap().ends_with("run00001_scene_2.png"));
}

#[tokio::test]
async fn test_full_pipeline_over_http() {
    let app = build(true).await;
    let (status, accepted) = send(
        &app,
        post(
            "/api/v1/pipeline/generate",
            json!({
                "run_id": "run00002",
                "user_id": "alice",
                "story": story(),
                "drawing": drawing()
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["current_stage"], "images");

    let job = wait_for_job(&app, "alice", "run00002").await;
    assert_eq!(job["status"], "complete");
    assert_eq!(job["current_stage"], "video_complete");
    assert_eq!(job["images"].as_array().unwrap().len(), 2);
    assert_eq!(job["audio"].as_array().unwrap().len(), 2);
    assert!(job["video"]["video_key"]
        .as_str()
        .unwrap()
        .ends_with("run00002_final.mp4"));
    assert_eq!(job["video"]["duration_sec"], 3.0);
}

#[tokio::test]
async fn test_duplicate_pipeline_submission_conflicts() {
    let app = build(false).await;
    let request = json!({
        "run_id": "run00003",
        "user_id": "alice",
        "story": story(),
        "drawing": drawing()
    });

    let (status, _) = send(&app, post("/api/v1/pipeline/generate", request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, post("/api/v1/pipeline/generate", request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_unsafe_ids_are_rejected() {
    let app = build(false).await;

    let (status, body) = send(
        &app,
        post(
            "/api/v1/images/generate",
            json!({"run_id": "../../escaped", "story": story(), "drawing": drawing()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    for uri in [
        "/api/v1/jobs/run.00001/status?user_id=alice",
        "/api/v1/jobs/run00001/status?user_id=alice%2Fcheckpoints",
        "/api/v1/library?user_id=..%2Fbob",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], "validation_error", "{uri}");
    }

    let (status, _) = send(&app, delete("/api/v1/library/e1?user_id=a%5Cb")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_library_round_trip() {
    let app = build(false).await;
    for (id, created_at) in [("e1", "2024-01-01T00:00:00Z"), ("e2", "2024-06-01T00:00:00Z")] {
        let (status, body) = send(
            &app,
            post(
                "/api/v1/library?user_id=alice",
                json!({
                    "id": id,
                    "title": "The Purple Dragon",
                    "thumbnail_key": format!("alice/videos/{id}_thumb.jpg"),
                    "video_key": format!("alice/videos/{id}_final.mp4"),
                    "duration_sec": 30.5,
                    "style": "watercolor",
                    "created_at": created_at
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
    }

    let (_, list) = send(&app, get("/api/v1/library?user_id=alice")).await;
    let ids: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["e2", "e1"]);

    let (status, body) = send(&app, delete("/api/v1/library/e2?user_id=alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");

    let (_, list) = send(&app, get("/api/v1/library?user_id=alice")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, other) = send(&app, get("/api/v1/library?user_id=bob")).await;
    assert!(other.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_presigned_url_outside_namespace_is_forbidden() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post(
            "/api/v1/storage/presigned-url?user_id=bob",
            json!({"s3_key": "alice/videos/run00001_final.mp4"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["detail"],
        "Access denied: S3 key does not belong to this user"
    );
}

#[tokio::test]
async fn test_presigned_url_without_backend() {
    let app = build(false).await;
    let (status, body) = send(
        &app,
        post(
            "/api/v1/storage/presigned-url?user_id=alice&purpose=delivery",
            json!({"s3_key": "alice/videos/run00001_final.mp4"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "storage_not_configured");
    assert_eq!(body["detail"], "S3 storage not configured");
}

#[tokio::test]
async fn test_response_headers() {
    let app = build(false).await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = build(false).await;
    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
