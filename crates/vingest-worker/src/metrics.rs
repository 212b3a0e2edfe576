//! Pipeline metrics.

use std::time::Duration;

use metrics::{counter, histogram};

pub mod names {
    pub const RUNS_STARTED: &str = "vingest_runs_started_total";
    pub const RUNS_COMPLETED: &str = "vingest_runs_completed_total";
    pub const RUNS_FAILED: &str = "vingest_runs_failed_total";
    pub const STAGE_DURATION: &str = "vingest_stage_duration_seconds";
    pub const STAGE_FAILURES: &str = "vingest_stage_failures_total";
}

pub fn record_run_started() {
    counter!(names::RUNS_STARTED).increment(1);
}

pub fn record_run_completed() {
    counter!(names::RUNS_COMPLETED).increment(1);
}

pub fn record_run_failed() {
    counter!(names::RUNS_FAILED).increment(1);
}

/// Record how long a stage took and whether it failed.
pub fn record_stage(stage: &'static str, elapsed: Duration, ok: bool) {
    histogram!(names::STAGE_DURATION, "stage" => stage).record(elapsed.as_secs_f64());
    if !ok {
        counter!(names::STAGE_FAILURES, "stage" => stage).increment(1);
    }
}
