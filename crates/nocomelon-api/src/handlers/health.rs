//! Health and dependency status handlers.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use nocomelon_media::check_ffmpeg;
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub openai: &'static str,
    pub elevenlabs: &'static str,
    pub ffmpeg: &'static str,
    pub data_dir: &'static str,
    pub storage: &'static str,
    pub checkpoints: &'static str,
    pub active_runs: usize,
}

fn configured(present: bool) -> &'static str {
    if present {
        "configured"
    } else {
        "missing"
    }
}

/// Dependency status. Always 200; each field reports one dependency.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ctx = state.controller.context();

    let ffmpeg = match check_ffmpeg() {
        Ok(_) => "installed",
        Err(_) => "missing",
    };

    let data_dir = match ctx.storage.local().ensure_dirs().await {
        Ok(()) => "writable",
        Err(e) => {
            warn!("Data directory check failed: {}", e);
            "error"
        }
    };

    let storage = match tokio::time::timeout(CHECK_TIMEOUT, ctx.storage.check_connectivity()).await {
        Ok(Ok(())) if ctx.storage.is_durable() => "ok",
        Ok(Ok(())) => "local",
        Ok(Err(e)) => {
            warn!("Storage check failed: {}", e);
            "error"
        }
        Err(_) => "timeout",
    };

    let checkpoints =
        match tokio::time::timeout(CHECK_TIMEOUT, ctx.checkpoints.check_connectivity()).await {
            Ok(Ok(())) => "ok",
            Ok(Err(e)) => {
                warn!("Checkpoint store check failed: {}", e);
                "error"
            }
            Err(_) => "timeout",
        };

    Json(StatusResponse {
        openai: configured(state.providers.openai),
        elevenlabs: configured(state.providers.elevenlabs),
        ffmpeg,
        data_dir,
        storage,
        checkpoints,
        active_runs: state.controller.in_flight(),
    })
}
