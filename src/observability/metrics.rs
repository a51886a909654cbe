//! Lifecycle metrics.
//!
//! Counters are emitted through the `metrics` facade when the `prometheus`
//! feature is enabled; without it every recorder is a no-op. Installing an
//! exporter is left to the embedding process.

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};

/// Record lifecycle transitions applied by a sweep.
///
/// # Arguments
/// * `transition` - `"soft_delete"`, `"purge"` or `"force_purge"`
/// * `count` - The number of polls transitioned
pub fn record_lifecycle_transition(transition: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "lifecycle_transitions_total",
            "transition" => transition.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (transition, count);
    }
}

/// Record child rows removed together with purged polls.
///
/// # Arguments
/// * `table` - `"choices"` or `"votes"`
/// * `count` - The number of rows deleted
pub fn record_dependent_purge(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "lifecycle_dependents_purged_total",
            "table" => table.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, count);
    }
}

/// Record a sweep that aborted on a fatal store error.
pub fn record_sweep_error() {
    #[cfg(feature = "prometheus")]
    counter!("cleanup_sweep_errors_total").increment(1);
}

/// Record how long a completed sweep took.
pub fn record_sweep_duration(dry_run: bool, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!(
            "cleanup_sweep_duration_seconds",
            "dry_run" => dry_run.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (dry_run, duration_secs);
    }
}

/// Record the outcome of one admin action on one poll.
///
/// # Arguments
/// * `action` - `"soft_delete"`, `"restore"` or `"extend"`
/// * `outcome` - `"applied"`, `"skipped"` or `"failed"`
pub fn record_admin_action(action: &str, outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "admin_actions_total",
            "action" => action.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (action, outcome);
    }
}
