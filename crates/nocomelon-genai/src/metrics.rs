//! Generation call metrics.

use std::time::Duration;

use metrics::{counter, histogram};

pub const REQUESTS_TOTAL: &str = "nocomelon_genai_requests_total";
pub const LATENCY_SECONDS: &str = "nocomelon_genai_latency_seconds";

pub fn record_call(provider: &'static str, operation: &'static str, ok: bool, elapsed: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "provider" => provider,
        "operation" => operation,
        "outcome" => if ok { "success" } else { "error" }
    )
    .increment(1);

    histogram!(LATENCY_SECONDS, "provider" => provider, "operation" => operation)
        .record(elapsed.as_secs_f64());
}
