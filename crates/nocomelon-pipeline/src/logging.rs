//! Structured run logging.
//!
//! Every lifecycle line carries the run key and operation so background runs
//! can be followed in aggregated logs.

use nocomelon_models::{PipelineStage, RunKey};
use tracing::{error, info, warn, Span};

/// Logger for one run and operation.
#[derive(Debug, Clone)]
pub struct RunLogger {
    user_id: String,
    run_id: String,
    operation: &'static str,
}

impl RunLogger {
    pub fn new(key: &RunKey, operation: &'static str) -> Self {
        Self {
            user_id: key.user_id.clone(),
            run_id: key.run_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_stage(&self, stage: PipelineStage, message: &str) {
        info!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
            stage = %stage,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, stage: PipelineStage, message: &str) {
        error!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
            stage = %stage,
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
            "Run completed: {}", message
        );
    }

    /// Span wrapping the whole run.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "pipeline_run",
            user_id = %self.user_id,
            run_id = %self.run_id,
            operation = self.operation,
        )
    }
}
