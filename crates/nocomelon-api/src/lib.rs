//! Axum HTTP API for the storybook pipeline.
//!
//! This crate provides:
//! - Synchronous stage endpoints and asynchronous run submission
//! - Job status polling over the checkpoint store
//! - Library and presigned-URL endpoints
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, CheckpointBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, Providers};
