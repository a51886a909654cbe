//! Two-phase cleanup sweep.
//!
//! Phase 1 reads the non-deleted polls and transitions every Expired one
//! (soft-delete, or purge when `force_expired` is set). Phase 2 reads the
//! soft-deleted polls and purges every PurgeEligible one. Each transition is
//! its own conditional write, so an aborted or overlapping sweep leaves the
//! store consistent and the next run picks up whatever is left.

use std::{fmt, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::RetentionSafety,
    db::{DbError, DbResult, PollRepo, PurgeReason},
    lifecycle::{Lifecycle, LifecycleState},
    models::{DependentCounts, Poll, StateCounts},
    observability::metrics,
};

/// Modes for a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOptions {
    /// Compute the transitions without applying any of them.
    pub dry_run: bool,
    /// Purge newly expired polls directly instead of soft-deleting them.
    pub force_expired: bool,
    /// Cap on soft-deletes plus purges for this run. 0 = unlimited.
    pub max_transitions: u64,
}

impl SweepOptions {
    /// Options carrying the configured safety settings.
    pub fn from_safety(safety: &RetentionSafety) -> Self {
        Self {
            dry_run: safety.dry_run,
            force_expired: false,
            max_transitions: safety.max_transitions_per_run,
        }
    }
}

/// An Active poll whose expiry falls within the warning threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringPoll {
    pub id: Uuid,
    pub question: String,
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
}

/// Outcome of one sweep.
///
/// In a dry run the transition counts are what the sweep would have done.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub force_expired: bool,
    /// Expired polls found by phase 1.
    pub expired_found: u64,
    /// Expired polls soft-deleted by phase 1.
    pub soft_deleted: u64,
    /// Expired polls purged directly by phase 1 (`force_expired`).
    pub force_purged: u64,
    /// PurgeEligible polls found by phase 2.
    pub purge_eligible_found: u64,
    /// PurgeEligible polls purged by phase 2.
    pub purged: u64,
    /// Child rows removed along with the purged polls.
    pub dependents_purged: DependentCounts,
    /// Transitions that became no-ops because another writer got there first.
    pub skipped: u64,
    /// Active polls expiring within the warning threshold, soonest first.
    pub expiring_soon: Vec<ExpiringPoll>,
    pub warning_threshold_days: i64,
    /// Polls per lifecycle state once the sweep finished.
    pub state_totals: StateCounts,
    /// The sweep was stopped by its cancellation token.
    pub cancelled: bool,
    /// The sweep stopped at `max_transitions`.
    pub limit_reached: bool,
    pub duration_ms: u64,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>, options: &SweepOptions, lifecycle: &Lifecycle) -> Self {
        Self {
            started_at,
            dry_run: options.dry_run,
            force_expired: options.force_expired,
            expired_found: 0,
            soft_deleted: 0,
            force_purged: 0,
            purge_eligible_found: 0,
            purged: 0,
            dependents_purged: DependentCounts::default(),
            skipped: 0,
            expiring_soon: Vec::new(),
            warning_threshold_days: lifecycle.policy().warning_threshold.num_days(),
            state_totals: StateCounts::default(),
            cancelled: false,
            limit_reached: false,
            duration_ms: 0,
        }
    }

    /// Soft-deletes plus purges (applied, or planned in a dry run).
    pub fn transitions(&self) -> u64 {
        self.soft_deleted + self.force_purged + self.purged
    }

    pub fn has_transitions(&self) -> bool {
        self.transitions() > 0
    }

    /// Polls permanently removed this run.
    pub fn total_purged(&self) -> u64 {
        self.force_purged + self.purged
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = |done: &'static str, planned: &'static str| {
            if self.dry_run { planned } else { done }
        };

        if self.dry_run {
            writeln!(f, "Cleanup sweep at {} (DRY RUN, no changes made)", self.started_at)?;
        } else {
            writeln!(f, "Cleanup sweep at {}", self.started_at)?;
        }
        writeln!(
            f,
            "  {:<24}{}",
            verb("Soft-deleted:", "Would soft-delete:"),
            self.soft_deleted
        )?;
        writeln!(
            f,
            "  {:<24}{} ({} grace elapsed, {} expired) removing {} choices and {} votes",
            verb("Purged:", "Would purge:"),
            self.total_purged(),
            self.purged,
            self.force_purged,
            self.dependents_purged.choices,
            self.dependents_purged.votes
        )?;
        if self.skipped > 0 {
            writeln!(f, "  {:<24}{}", "Skipped (changed):", self.skipped)?;
        }
        writeln!(
            f,
            "  {:<24}{}",
            format!("Expiring in {}d:", self.warning_threshold_days),
            self.expiring_soon.len()
        )?;
        for poll in &self.expiring_soon {
            writeln!(
                f,
                "    {}  {} ({}d)  {}",
                poll.id, poll.expires_at, poll.days_remaining, poll.question
            )?;
        }
        writeln!(f, "  Totals:")?;
        for state in LifecycleState::ALL {
            writeln!(f, "    {:<16}{}", state.as_str(), self.state_totals.get(state))?;
        }
        if self.cancelled {
            writeln!(f, "  Sweep cancelled before completion")?;
        }
        if self.limit_reached {
            writeln!(f, "  Transition limit reached; remaining polls left for the next run")?;
        }
        Ok(())
    }
}

/// A sweep aborted by a fatal store error. Transitions committed before the
/// failure stay committed and are counted in `partial`.
#[derive(Debug, thiserror::Error)]
#[error("Cleanup sweep aborted: {source}")]
pub struct SweepError {
    #[source]
    pub source: DbError,
    pub partial: Box<SweepReport>,
}

/// The reclamation pass over the poll store.
#[derive(Clone)]
pub struct CleanupSweep {
    polls: Arc<dyn PollRepo>,
    lifecycle: Lifecycle,
}

impl CleanupSweep {
    pub fn new(polls: Arc<dyn PollRepo>, lifecycle: Lifecycle) -> Self {
        Self { polls, lifecycle }
    }

    pub async fn run(&self, options: &SweepOptions) -> Result<SweepReport, SweepError> {
        self.run_with_cancellation(options, &CancellationToken::new())
            .await
    }

    /// Run a sweep that stops between polls once `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        options: &SweepOptions,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, SweepError> {
        let start = Instant::now();
        let mut report = SweepReport::new(self.lifecycle.now(), options, &self.lifecycle);

        let result = self.sweep(options, cancel, &mut report).await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                if !options.dry_run {
                    metrics::record_lifecycle_transition("soft_delete", report.soft_deleted);
                    metrics::record_lifecycle_transition("force_purge", report.force_purged);
                    metrics::record_lifecycle_transition("purge", report.purged);
                    metrics::record_dependent_purge("choices", report.dependents_purged.choices);
                    metrics::record_dependent_purge("votes", report.dependents_purged.votes);
                }
                metrics::record_sweep_duration(options.dry_run, start.elapsed().as_secs_f64());
                Ok(report)
            }
            Err(source) => {
                tracing::error!(
                    error = %source,
                    soft_deleted = report.soft_deleted,
                    purged = report.total_purged(),
                    "Cleanup sweep aborted"
                );
                metrics::record_sweep_error();
                Err(SweepError {
                    source,
                    partial: Box::new(report),
                })
            }
        }
    }

    async fn sweep(
        &self,
        options: &SweepOptions,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> DbResult<()> {
        if self.expire_phase(options, cancel, report).await? {
            self.purge_phase(options, cancel, report).await?;
        }

        report.state_totals = self.polls.count_by_state().await?;
        report.expiring_soon = self.expiring_soon().await?;
        Ok(())
    }

    /// Phase 1. Returns false when the sweep must stop.
    async fn expire_phase(
        &self,
        options: &SweepOptions,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> DbResult<bool> {
        let now = self.lifecycle.now();
        let expired: Vec<Poll> = self
            .polls
            .non_deleted()
            .await?
            .into_iter()
            .filter(|poll| self.lifecycle.classify_at(poll, now) == LifecycleState::Expired)
            .collect();
        report.expired_found = expired.len() as u64;

        tracing::debug!(
            expired = expired.len(),
            force_expired = options.force_expired,
            "Expire phase: found expired polls"
        );

        for poll in &expired {
            if self.should_stop(options, cancel, report) {
                return Ok(false);
            }

            if options.force_expired {
                if options.dry_run {
                    let dependents = self.polls.count_dependents(poll.id).await?;
                    tracing::info!(
                        poll_id = %poll.id,
                        choices = dependents.choices,
                        votes = dependents.votes,
                        "DRY RUN: Would purge expired poll"
                    );
                    report.force_purged += 1;
                    report.dependents_purged += dependents;
                    continue;
                }

                match self.polls.purge(poll.id, PurgeReason::ForcedExpiry).await {
                    Ok(dependents) => {
                        tracing::info!(
                            poll_id = %poll.id,
                            choices = dependents.choices,
                            votes = dependents.votes,
                            "Purged expired poll"
                        );
                        report.force_purged += 1;
                        report.dependents_purged += dependents;
                    }
                    Err(e) => skip_or_abort(e, poll.id, "purge", report)?,
                }
            } else {
                if options.dry_run {
                    tracing::info!(poll_id = %poll.id, "DRY RUN: Would soft-delete expired poll");
                    report.soft_deleted += 1;
                    continue;
                }

                match self.polls.soft_delete(poll.id).await {
                    Ok(_) => {
                        tracing::info!(poll_id = %poll.id, "Soft-deleted expired poll");
                        report.soft_deleted += 1;
                    }
                    Err(e) => skip_or_abort(e, poll.id, "soft_delete", report)?,
                }
            }
        }

        Ok(true)
    }

    /// Phase 2. Returns false when the sweep must stop.
    async fn purge_phase(
        &self,
        options: &SweepOptions,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> DbResult<bool> {
        let now = self.lifecycle.now();
        let eligible: Vec<Poll> = self
            .polls
            .soft_deleted()
            .await?
            .into_iter()
            .filter(|poll| {
                self.lifecycle.classify_at(poll, now) == LifecycleState::PurgeEligible
            })
            .collect();
        report.purge_eligible_found = eligible.len() as u64;

        tracing::debug!(
            purge_eligible = eligible.len(),
            "Purge phase: found polls past their grace period"
        );

        for poll in &eligible {
            if self.should_stop(options, cancel, report) {
                return Ok(false);
            }

            if options.dry_run {
                let dependents = self.polls.count_dependents(poll.id).await?;
                tracing::info!(
                    poll_id = %poll.id,
                    deleted_at = ?poll.deleted_at,
                    choices = dependents.choices,
                    votes = dependents.votes,
                    "DRY RUN: Would purge soft-deleted poll"
                );
                report.purged += 1;
                report.dependents_purged += dependents;
                continue;
            }

            match self.polls.purge(poll.id, PurgeReason::GraceElapsed).await {
                Ok(dependents) => {
                    tracing::info!(
                        poll_id = %poll.id,
                        choices = dependents.choices,
                        votes = dependents.votes,
                        "Purged soft-deleted poll"
                    );
                    report.purged += 1;
                    report.dependents_purged += dependents;
                }
                Err(e) => skip_or_abort(e, poll.id, "purge", report)?,
            }
        }

        Ok(true)
    }

    fn should_stop(
        &self,
        options: &SweepOptions,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> bool {
        if cancel.is_cancelled() {
            tracing::info!(
                transitions = report.transitions(),
                "Cleanup sweep cancelled"
            );
            report.cancelled = true;
            return true;
        }
        if options.max_transitions > 0 && report.transitions() >= options.max_transitions {
            tracing::warn!(
                max_transitions = options.max_transitions,
                "Cleanup sweep reached its transition limit"
            );
            report.limit_reached = true;
            return true;
        }
        false
    }

    /// Active polls expiring within the warning threshold, soonest first.
    pub async fn expiring_soon(&self) -> DbResult<Vec<ExpiringPoll>> {
        let now = self.lifecycle.now();
        let mut expiring: Vec<ExpiringPoll> = self
            .polls
            .active()
            .await?
            .into_iter()
            .filter(|poll| self.lifecycle.is_expiring_soon(poll, now))
            .filter_map(|poll| {
                let expires_at = poll.expires_at?;
                Some(ExpiringPoll {
                    id: poll.id,
                    question: poll.question,
                    expires_at,
                    days_remaining: (expires_at - now).num_days(),
                })
            })
            .collect();
        expiring.sort_by_key(|poll| poll.expires_at);
        Ok(expiring)
    }
}

/// Lost races are counted and skipped; anything else aborts the sweep.
fn skip_or_abort(
    error: DbError,
    poll_id: Uuid,
    transition: &str,
    report: &mut SweepReport,
) -> DbResult<()> {
    if error.is_precondition_failure() || matches!(error, DbError::NotFound) {
        tracing::debug!(
            poll_id = %poll_id,
            transition,
            reason = %error,
            "Skipping poll changed by another writer"
        );
        report.skipped += 1;
        Ok(())
    } else {
        Err(error)
    }
}
