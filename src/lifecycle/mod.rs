//! Poll lifecycle: time source, retention policy and state classification.
//!
//! Lifecycle state is derived, never stored. Every decision goes through
//! [`classify`] with the instant supplied by the injected [`Clock`].

mod classifier;
mod clock;
mod policy;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
pub use classifier::{LifecycleState, classify, classify_timestamps};
pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::{ADMIN_EXTENSION_DAYS, ExpirationChoice, GRACE_PERIOD_DAYS, RetentionPolicy};

use crate::models::{Poll, PollStatus};

/// Clock and policy bundled together, shared by the repository and the sweep.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    clock: Arc<dyn Clock>,
    policy: RetentionPolicy,
}

impl Lifecycle {
    pub fn new(clock: Arc<dyn Clock>, policy: RetentionPolicy) -> Self {
        Self { clock, policy }
    }

    /// Wall-clock lifecycle with the given policy.
    pub fn system(policy: RetentionPolicy) -> Self {
        Self::new(Arc::new(SystemClock), policy)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn classify(&self, poll: &Poll) -> LifecycleState {
        self.classify_at(poll, self.now())
    }

    pub fn classify_at(&self, poll: &Poll, now: DateTime<Utc>) -> LifecycleState {
        classify(poll, now, self.policy.grace_period)
    }

    /// Time left before expiry, for Active polls with a finite expiry.
    pub fn remaining_until_expiry(&self, poll: &Poll, now: DateTime<Utc>) -> Option<Duration> {
        match (self.classify_at(poll, now), poll.expires_at) {
            (LifecycleState::Active, Some(expires_at)) => Some(expires_at - now),
            _ => None,
        }
    }

    /// Active and expiring within the policy's warning threshold.
    pub fn is_expiring_soon(&self, poll: &Poll, now: DateTime<Utc>) -> bool {
        self.remaining_until_expiry(poll, now)
            .is_some_and(|remaining| remaining <= self.policy.warning_threshold)
    }

    pub fn status(&self, poll: &Poll) -> PollStatus {
        self.status_at(poll, self.now())
    }

    /// UI-facing derived properties at `now`.
    pub fn status_at(&self, poll: &Poll, now: DateTime<Utc>) -> PollStatus {
        let state = self.classify_at(poll, now);
        let days_until_expiration = poll
            .expires_at
            .map(|expires_at| (expires_at - now).num_days().max(0));
        let days_until_permanent_deletion = poll
            .deleted_at
            .map(|deleted_at| (deleted_at + self.policy.grace_period - now).num_days().max(0));

        PollStatus {
            state,
            is_expired: state == LifecycleState::Expired,
            is_soft_deleted: matches!(
                state,
                LifecycleState::SoftDeleted | LifecycleState::PurgeEligible
            ),
            days_until_expiration,
            days_until_permanent_deletion,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn fixture() -> (Arc<ManualClock>, Lifecycle) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
        ));
        let lifecycle = Lifecycle::new(clock.clone(), RetentionPolicy::default());
        (clock, lifecycle)
    }

    fn poll_at(now: DateTime<Utc>, expires_in: Option<Duration>) -> Poll {
        Poll {
            id: Uuid::new_v4(),
            question: "Best editor?".to_string(),
            created_at: now,
            updated_at: now,
            expires_at: expires_in.map(|d| now + d),
            deleted_at: None,
        }
    }

    #[test]
    fn test_status_for_active_poll() {
        let (_, lifecycle) = fixture();
        let now = lifecycle.now();
        let poll = poll_at(now, Some(Duration::days(10) + Duration::hours(5)));

        let status = lifecycle.status(&poll);
        assert_eq!(status.state, LifecycleState::Active);
        assert!(!status.is_expired);
        assert!(!status.is_soft_deleted);
        assert_eq!(status.days_until_expiration, Some(10));
        assert_eq!(status.days_until_permanent_deletion, None);
    }

    #[test]
    fn test_status_follows_clock() {
        let (clock, lifecycle) = fixture();
        let poll = poll_at(lifecycle.now(), Some(Duration::days(3)));

        clock.advance(Duration::days(4));
        let status = lifecycle.status(&poll);
        assert_eq!(status.state, LifecycleState::Expired);
        assert!(status.is_expired);
        assert_eq!(status.days_until_expiration, Some(0));
    }

    #[test]
    fn test_status_for_soft_deleted_poll() {
        let (clock, lifecycle) = fixture();
        let mut poll = poll_at(lifecycle.now(), None);
        poll.deleted_at = Some(lifecycle.now());

        clock.advance(Duration::days(12));
        let status = lifecycle.status(&poll);
        assert_eq!(status.state, LifecycleState::SoftDeleted);
        assert!(status.is_soft_deleted);
        assert_eq!(status.days_until_expiration, None);
        assert_eq!(status.days_until_permanent_deletion, Some(18));

        clock.advance(Duration::days(40));
        let status = lifecycle.status(&poll);
        assert_eq!(status.state, LifecycleState::PurgeEligible);
        assert_eq!(status.days_until_permanent_deletion, Some(0));
    }

    #[test]
    fn test_soft_deleted_poll_past_expiry_is_not_expired() {
        let (clock, lifecycle) = fixture();
        let mut poll = poll_at(lifecycle.now(), Some(Duration::days(2)));
        poll.deleted_at = Some(lifecycle.now());

        clock.advance(Duration::days(5));
        let status = lifecycle.status(&poll);
        assert_eq!(status.state, LifecycleState::SoftDeleted);
        assert!(!status.is_expired);
        assert!(status.is_soft_deleted);
        assert_eq!(status.days_until_expiration, Some(0));
    }

    #[test]
    fn test_expiring_soon_threshold() {
        let (_, lifecycle) = fixture();
        let now = lifecycle.now();

        assert!(lifecycle.is_expiring_soon(&poll_at(now, Some(Duration::days(7))), now));
        assert!(lifecycle.is_expiring_soon(&poll_at(now, Some(Duration::hours(1))), now));
        assert!(!lifecycle.is_expiring_soon(&poll_at(now, Some(Duration::days(8))), now));
        assert!(!lifecycle.is_expiring_soon(&poll_at(now, None), now));
        // Already expired polls are not "expiring soon".
        assert!(!lifecycle.is_expiring_soon(&poll_at(now, Some(Duration::zero())), now));
    }
}
