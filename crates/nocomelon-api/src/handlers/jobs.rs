//! Job status polling.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use nocomelon_models::{
    Checkpoint, CheckpointStatus, DrawingAnalysis, GeneratedAudio, GeneratedImage, RunKey,
    StoryScript, VideoResult,
};
use nocomelon_pipeline::check_id;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::handlers::UserQuery;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub user_id: String,
    pub run_id: String,
    pub status: CheckpointStatus,
    pub current_stage: String,
    pub error: Option<String>,
    pub drawing_analysis: Option<DrawingAnalysis>,
    pub story_script: Option<StoryScript>,
    pub images: Option<Vec<GeneratedImage>>,
    pub audio: Option<Vec<GeneratedAudio>>,
    pub video: Option<VideoResult>,
    pub updated_at: DateTime<Utc>,
}

impl From<Checkpoint> for JobStatusResponse {
    fn from(c: Checkpoint) -> Self {
        Self {
            user_id: c.user_id,
            run_id: c.run_id,
            status: c.status,
            current_stage: c.current_stage,
            error: c.error,
            drawing_analysis: c.drawing_analysis,
            story_script: c.story_script,
            images: c.images,
            audio: c.audio,
            video: c.video,
            updated_at: c.updated_at,
        }
    }
}

/// Latest checkpoint for a run. Expired and unknown runs are 404.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<JobStatusResponse>> {
    check_id("user_id", &query.user_id)?;
    check_id("run_id", &run_id)?;
    let key = RunKey::new(query.user_id, run_id);
    let checkpoint = state
        .controller
        .context()
        .checkpoints
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(checkpoint.into()))
}
