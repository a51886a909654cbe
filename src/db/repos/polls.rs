use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{Choice, CreatePoll, DependentCounts, Poll, StateCounts},
};

/// Why a purge is being requested. Each reason carries its own precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReason {
    /// The poll is soft-deleted and its grace period has elapsed.
    GraceElapsed,
    /// The poll has expired and the run skips the soft-delete stage.
    ForcedExpiry,
}

impl PurgeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeReason::GraceElapsed => "grace_elapsed",
            PurgeReason::ForcedExpiry => "forced_expiry",
        }
    }
}

/// Persistence surface for polls.
///
/// Query methods evaluate lifecycle state against the clock at call time.
/// Transition methods are conditional writes: when the precondition no longer
/// holds (a concurrent writer got there first) they fail with a precondition
/// error instead of overwriting.
#[async_trait]
pub trait PollRepo: Send + Sync {
    /// Create a new poll with its choices
    async fn create(&self, input: CreatePoll) -> DbResult<Poll>;

    /// Get a poll by ID regardless of lifecycle state
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Poll>>;

    /// Every poll that still exists, oldest first
    async fn all(&self) -> DbResult<Vec<Poll>>;

    /// Polls with `deleted_at` unset (Active or Expired)
    async fn non_deleted(&self) -> DbResult<Vec<Poll>>;

    /// Polls that are Active right now
    async fn active(&self) -> DbResult<Vec<Poll>>;

    /// Polls with `deleted_at` set (SoftDeleted or PurgeEligible)
    async fn soft_deleted(&self) -> DbResult<Vec<Poll>>;

    /// Number of polls per lifecycle state right now
    async fn count_by_state(&self) -> DbResult<StateCounts>;

    /// Answer options of a poll in display order, with their tallies.
    /// Empty when the poll does not exist.
    async fn choices(&self, poll_id: Uuid) -> DbResult<Vec<Choice>>;

    /// Choices and votes attached to a poll
    async fn count_dependents(&self, id: Uuid) -> DbResult<DependentCounts>;

    // ==================== Transition Operations ====================

    /// Mark a poll deleted. Fails with `AlreadySoftDeleted` when `deleted_at` is set.
    async fn soft_delete(&self, id: Uuid) -> DbResult<Poll>;

    /// Clear `deleted_at`. Fails with `NotSoftDeleted` when it is already unset.
    ///
    /// Allowed until the purge actually commits, even past the grace period.
    /// `expires_at` is unchanged, so a restored poll may still be Expired.
    async fn restore(&self, id: Uuid) -> DbResult<Poll>;

    /// Push `expires_at` to `max(now, expires_at) + duration`.
    ///
    /// `duration` must be one of the finite expiration choices. Never-expiring
    /// polls become `now + duration` unless the policy forbids it.
    async fn extend_expiration(&self, id: Uuid, duration: Duration) -> DbResult<Poll>;

    /// Permanently remove a poll and its choices and votes. Irreversible.
    async fn purge(&self, id: Uuid, reason: PurgeReason) -> DbResult<DependentCounts>;
}
