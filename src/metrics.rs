// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics through the `metrics` facade for:
//! - Store connection attempts
//! - Per-record outcomes (copied, deleted, failures, skipped)
//! - Copy and delete latency
//! - Run results and duration
//!
//! Nothing is recorded unless the embedding process installs a recorder.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `docmover_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Histograms track durations in seconds

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a store connection attempt.
pub fn record_store_connection(store: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("docmover_store_connections_total", "store" => store.to_string(), "status" => status).increment(1);
}

/// Record the terminal state of one record.
pub fn record_outcome(namespace: &str, state: &'static str) {
    counter!("docmover_records_total", "namespace" => namespace.to_string(), "state" => state).increment(1);
}

/// Record several records reaching the same terminal state (e.g. skipped after a halt).
pub fn record_outcomes(namespace: &str, state: &'static str, count: u64) {
    if count > 0 {
        counter!("docmover_records_total", "namespace" => namespace.to_string(), "state" => state).increment(count);
    }
}

/// Record latency of one destination insert.
pub fn record_copy_latency(namespace: &str, duration: Duration) {
    histogram!("docmover_copy_duration_seconds", "namespace" => namespace.to_string())
        .record(duration.as_secs_f64());
}

/// Record latency of one source delete.
pub fn record_delete_latency(namespace: &str, duration: Duration) {
    histogram!("docmover_delete_duration_seconds", "namespace" => namespace.to_string())
        .record(duration.as_secs_f64());
}

/// Record a finished run.
pub fn record_run(namespace: &str, status: &'static str, duration: Duration) {
    counter!("docmover_runs_total", "namespace" => namespace.to_string(), "status" => status).increment(1);
    histogram!("docmover_run_duration_seconds", "namespace" => namespace.to_string())
        .record(duration.as_secs_f64());
}

/// Record a run that aborted before touching data.
pub fn record_run_aborted(namespace: &str, reason: &'static str) {
    counter!("docmover_runs_aborted_total", "namespace" => namespace.to_string(), "reason" => reason).increment(1);
}

/// Record the cutoff used by the latest run (epoch seconds).
pub fn record_cutoff(namespace: &str, cutoff_millis: i64) {
    gauge!("docmover_last_cutoff_seconds", "namespace" => namespace.to_string())
        .set(cutoff_millis as f64 / 1000.0);
}
