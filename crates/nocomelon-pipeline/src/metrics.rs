//! Pipeline metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use nocomelon_models::PipelineStage;

pub mod names {
    pub const RUNS_TOTAL: &str = "nocomelon_runs_total";
    pub const RUNS_IN_FLIGHT: &str = "nocomelon_runs_in_flight";
    pub const RUNS_REJECTED_TOTAL: &str = "nocomelon_runs_rejected_total";
    pub const STAGE_DURATION_SECONDS: &str = "nocomelon_stage_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "nocomelon_stage_failures_total";
}

/// Count a finished background run.
pub fn record_run(kind: &'static str, outcome: &'static str) {
    counter!(names::RUNS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}

/// Count a submission turned away before queuing.
pub fn record_rejected(reason: &'static str) {
    counter!(names::RUNS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

pub fn set_in_flight(count: usize) {
    gauge!(names::RUNS_IN_FLIGHT).set(count as f64);
}

pub fn record_stage(stage: PipelineStage, ok: bool, elapsed: Duration) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str())
        .record(elapsed.as_secs_f64());
    if !ok {
        counter!(names::STAGE_FAILURES_TOTAL, "stage" => stage.as_str()).increment(1);
    }
}
