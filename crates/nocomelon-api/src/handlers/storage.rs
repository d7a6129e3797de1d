//! Presigned access URLs.

use axum::extract::State;
use axum::Json;
use nocomelon_pipeline::check_id;
use nocomelon_storage::{DEFAULT_URL_TTL, DELIVERY_URL_TTL};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PresignedUrlQuery {
    pub user_id: String,
    /// `delivery` for the final video, anything else for intermediates
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PresignedUrlRequest {
    pub s3_key: String,
}

#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// Presigned GET URL for a key inside the caller's namespace.
pub async fn generate_presigned_url(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PresignedUrlQuery>,
    ApiJson(request): ApiJson<PresignedUrlRequest>,
) -> ApiResult<Json<PresignedUrlResponse>> {
    check_id("user_id", &query.user_id)?;
    let ttl = match query.purpose.as_deref() {
        Some("delivery") => DELIVERY_URL_TTL,
        _ => DEFAULT_URL_TTL,
    };

    let url = state
        .controller
        .context()
        .storage
        .presigned_url_for_user(&query.user_id, &request.s3_key, ttl)
        .await?;

    Ok(Json(PresignedUrlResponse {
        url,
        expires_in: ttl.as_secs(),
    }))
}
