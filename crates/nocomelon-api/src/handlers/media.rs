//! Synchronous illustrate, narrate and assemble handlers.

use axum::extract::State;
use axum::Json;
use nocomelon_models::{
    AudioResult, ImageResult, ImagesRequest, VideoRequest, VideoResult, VoiceRequest,
};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

pub async fn generate_images(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImagesRequest>,
) -> ApiResult<Json<ImageResult>> {
    Ok(Json(state.controller.illustrate(request).await?))
}

pub async fn generate_voice(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VoiceRequest>,
) -> ApiResult<Json<AudioResult>> {
    Ok(Json(state.controller.narrate(request).await?))
}

pub async fn assemble_video(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VideoRequest>,
) -> ApiResult<Json<VideoResult>> {
    Ok(Json(state.controller.assemble(request).await?))
}
