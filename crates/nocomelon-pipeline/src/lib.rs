//! Storybook pipeline orchestration.
//!
//! This crate provides:
//! - The five generation stages over pluggable collaborators
//! - Video assembly from scene images and narration
//! - A controller that checkpoints every stage transition
//! - A bounded queue and supervised worker pool for background runs

pub mod assembler;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::MediaAssembler;
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use controller::{check_id, PipelineController};
pub use error::{PipelineError, PipelineResult};
pub use executor::{ExecutorHandle, PipelineExecutor};
pub use jobs::PipelineJob;
pub use logging::RunLogger;
pub use registry::InFlightRuns;
