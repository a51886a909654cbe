//! Cleanup worker that runs the sweep on a fixed interval.
//!
//! An external scheduler invoking `pollkeep cleanup` remains the primary
//! trigger; this loop is for deployments that keep a long-running process.

use tokio_util::sync::CancellationToken;

use super::{CleanupSweep, SweepOptions};
use crate::config::RetentionConfig;

/// Runs the cleanup sweep every `interval_hours` until `cancel` fires.
///
/// A failed sweep is logged and retried at the next interval; committed
/// transitions are never rolled back, so resuming is always safe.
pub async fn start_cleanup_worker(
    sweep: CleanupSweep,
    config: RetentionConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Cleanup worker disabled by configuration");
        return;
    }

    let options = SweepOptions::from_safety(&config.safety);
    let dry_run_msg = if options.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        interval_hours = config.interval_hours,
        warning_threshold_days = config.warning_threshold_days,
        max_transitions_per_run = options.max_transitions,
        dry_run = options.dry_run,
        "Starting cleanup worker{}",
        dry_run_msg
    );

    let interval = config.interval();

    loop {
        match sweep.run_with_cancellation(&options, &cancel).await {
            Ok(report) => {
                if report.has_transitions() {
                    tracing::info!(
                        soft_deleted = report.soft_deleted,
                        purged = report.purged,
                        force_purged = report.force_purged,
                        choices = report.dependents_purged.choices,
                        votes = report.dependents_purged.votes,
                        skipped = report.skipped,
                        expiring_soon = report.expiring_soon.len(),
                        duration_ms = report.duration_ms,
                        dry_run = options.dry_run,
                        "Cleanup run complete{}",
                        dry_run_msg
                    );
                } else {
                    tracing::debug!(
                        expiring_soon = report.expiring_soon.len(),
                        "Cleanup run complete, nothing to transition"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running cleanup sweep");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Cleanup worker stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;
    use crate::{
        db::tests::harness::create_test_db, lifecycle::ExpirationChoice, models::CreatePoll,
    };

    #[tokio::test]
    async fn test_disabled_worker_returns_immediately() {
        let t = create_test_db().await;
        let sweep = CleanupSweep::new(t.db.polls(), t.lifecycle.clone());

        tokio::time::timeout(
            StdDuration::from_secs(5),
            start_cleanup_worker(sweep, RetentionConfig::default(), CancellationToken::new()),
        )
        .await
        .expect("disabled worker should not loop");
    }

    #[tokio::test]
    async fn test_worker_sweeps_then_stops_on_cancel() {
        let t = create_test_db().await;
        let poll = t
            .db
            .polls()
            .create(CreatePoll {
                question: "Expired".to_string(),
                choices: vec!["a".to_string(), "b".to_string()],
                expiration: ExpirationChoice::Days7,
            })
            .await
            .unwrap();
        t.clock.advance(Duration::days(8));

        let sweep = CleanupSweep::new(t.db.polls(), t.lifecycle.clone());
        let config = RetentionConfig {
            enabled: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_cleanup_worker(sweep, config, cancel.clone()));

        // Wait for the first sweep to land, then shut the worker down.
        let mut soft_deleted = false;
        for _ in 0..100 {
            let current = t.db.polls().get_by_id(poll.id).await.unwrap().unwrap();
            if current.deleted_at.is_some() {
                soft_deleted = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert!(soft_deleted);

        cancel.cancel();
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("worker should stop on cancel")
            .unwrap();
    }
}
