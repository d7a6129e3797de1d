//! Drawing analysis handlers.

use axum::extract::State;
use axum::Json;
use nocomelon_models::{Accepted, VisionRequest, VisionResponse};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Queue an analysis; poll the returned run id for the result.
pub async fn analyze_drawing(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VisionRequest>,
) -> ApiResult<Json<Accepted>> {
    Ok(Json(state.controller.submit_vision(request).await?))
}

pub async fn analyze_drawing_sync(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VisionRequest>,
) -> ApiResult<Json<VisionResponse>> {
    Ok(Json(state.controller.analyze(request).await?))
}
