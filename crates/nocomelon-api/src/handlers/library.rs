//! Storybook library handlers.

use axum::extract::{Path, State};
use axum::Json;
use nocomelon_models::LibraryEntry;
use nocomelon_pipeline::check_id;
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::UserQuery;
use crate::state::AppState;

/// Saved storybooks, newest first.
pub async fn list_library(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Vec<LibraryEntry>>> {
    check_id("user_id", &query.user_id)?;
    Ok(Json(state.library.list_for_user(&query.user_id).await?))
}

/// Save or replace a storybook by id.
pub async fn save_to_library(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiJson(entry): ApiJson<LibraryEntry>,
) -> ApiResult<Json<LibraryEntry>> {
    check_id("user_id", &query.user_id)?;
    if entry.id.trim().is_empty() {
        return Err(ApiError::Validation("id must not be empty".to_string()));
    }
    check_id("id", &entry.id)?;
    let saved = state.library.save_entry(&query.user_id, entry).await?;
    info!(user_id = %query.user_id, entry_id = %saved.id, "Storybook saved to library");
    Ok(Json(saved))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
}

/// Remove a storybook. Unknown ids succeed.
pub async fn delete_from_library(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    check_id("user_id", &query.user_id)?;
    check_id("id", &id)?;
    state.library.delete_entry(&query.user_id, &id).await?;
    info!(user_id = %query.user_id, entry_id = %id, "Storybook deleted from library");
    Ok(Json(DeleteResponse { status: "deleted" }))
}
