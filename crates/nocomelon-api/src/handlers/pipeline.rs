//! Full pipeline submission.

use axum::extract::State;
use axum::Json;
use nocomelon_models::{Accepted, PipelineRequest};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Queue illustrate, narrate and assemble. Progress is read from
/// `GET /api/v1/jobs/{run_id}/status`.
pub async fn generate_pipeline(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PipelineRequest>,
) -> ApiResult<Json<Accepted>> {
    Ok(Json(state.controller.submit_pipeline(request).await?))
}
