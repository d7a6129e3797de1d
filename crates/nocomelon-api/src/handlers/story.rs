//! Script generation handlers.

use axum::extract::State;
use axum::Json;
use nocomelon_models::{Accepted, StoryRequest, StoryScript};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Queue script generation for an existing run.
pub async fn generate_story(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StoryRequest>,
) -> ApiResult<Json<Accepted>> {
    Ok(Json(state.controller.submit_story(request).await?))
}

pub async fn generate_story_sync(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StoryRequest>,
) -> ApiResult<Json<StoryScript>> {
    Ok(Json(state.controller.script(request).await?))
}
