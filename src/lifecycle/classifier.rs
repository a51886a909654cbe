use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Poll;

/// Derived lifecycle state of a poll. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Expired,
    SoftDeleted,
    PurgeEligible,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 4] = [
        LifecycleState::Active,
        LifecycleState::Expired,
        LifecycleState::SoftDeleted,
        LifecycleState::PurgeEligible,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Expired => "expired",
            LifecycleState::SoftDeleted => "soft_deleted",
            LifecycleState::PurgeEligible => "purge_eligible",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a poll at `now`.
///
/// Only `expires_at` and `deleted_at` participate. Expiry is inclusive
/// (`expires_at == now` is Expired) and purge eligibility is inclusive
/// (`now - deleted_at == grace_period` is PurgeEligible).
pub fn classify(poll: &Poll, now: DateTime<Utc>, grace_period: Duration) -> LifecycleState {
    classify_timestamps(poll.expires_at, poll.deleted_at, now, grace_period)
}

pub fn classify_timestamps(
    expires_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    grace_period: Duration,
) -> LifecycleState {
    match (deleted_at, expires_at) {
        (Some(deleted_at), _) if now - deleted_at >= grace_period => LifecycleState::PurgeEligible,
        (Some(_), _) => LifecycleState::SoftDeleted,
        (None, Some(expires_at)) if expires_at <= now => LifecycleState::Expired,
        (None, _) => LifecycleState::Active,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use uuid::Uuid;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn poll(expires_at: Option<DateTime<Utc>>, deleted_at: Option<DateTime<Utc>>) -> Poll {
        Poll {
            id: Uuid::new_v4(),
            question: "Lunch?".to_string(),
            created_at: t0() - Duration::days(100),
            updated_at: t0() - Duration::days(100),
            expires_at,
            deleted_at,
        }
    }

    fn grace() -> Duration {
        Duration::days(30)
    }

    #[rstest]
    #[case(Duration::seconds(-1), LifecycleState::Expired)]
    #[case(Duration::zero(), LifecycleState::Expired)]
    #[case(Duration::seconds(1), LifecycleState::Active)]
    fn test_expiry_boundary(#[case] offset: Duration, #[case] expected: LifecycleState) {
        let now = t0();
        let p = poll(Some(now + offset), None);
        assert_eq!(classify(&p, now, grace()), expected);
    }

    #[test]
    fn test_never_expiring_is_active() {
        let p = poll(None, None);
        assert_eq!(classify(&p, t0(), grace()), LifecycleState::Active);
        assert_eq!(
            classify(&p, t0() + Duration::days(10_000), grace()),
            LifecycleState::Active
        );
    }

    #[rstest]
    #[case(Duration::zero(), LifecycleState::SoftDeleted)]
    #[case(Duration::days(15), LifecycleState::SoftDeleted)]
    #[case(Duration::days(30) - Duration::seconds(1), LifecycleState::SoftDeleted)]
    #[case(Duration::days(30), LifecycleState::PurgeEligible)]
    #[case(Duration::days(31), LifecycleState::PurgeEligible)]
    fn test_grace_window(#[case] elapsed: Duration, #[case] expected: LifecycleState) {
        let deleted_at = t0();
        let p = poll(Some(deleted_at + Duration::days(5)), Some(deleted_at));
        assert_eq!(classify(&p, deleted_at + elapsed, grace()), expected);
    }

    #[test]
    fn test_deletion_wins_over_expiry() {
        let now = t0();
        let p = poll(Some(now - Duration::days(2)), Some(now - Duration::days(1)));
        assert_eq!(classify(&p, now, grace()), LifecycleState::SoftDeleted);
    }

    #[test]
    fn test_other_fields_do_not_affect_state() {
        let now = t0();
        let mut a = poll(Some(now + Duration::days(1)), None);
        let b = a.clone();
        a.question = "Something else entirely".to_string();
        a.updated_at = now;
        a.created_at = now - Duration::days(1);
        assert_eq!(classify(&a, now, grace()), classify(&b, now, grace()));
    }

    #[test]
    fn test_exactly_one_state_over_timeline() {
        let deleted_at = t0();
        let expires_at = t0() - Duration::days(3);
        for hours in (-200..=1000).step_by(7) {
            let now = deleted_at + Duration::hours(hours);
            let active = classify_timestamps(Some(expires_at), None, now, grace());
            let deleted = classify_timestamps(Some(expires_at), Some(deleted_at), now, grace());
            assert!(matches!(
                active,
                LifecycleState::Active | LifecycleState::Expired
            ));
            assert!(matches!(
                deleted,
                LifecycleState::SoftDeleted | LifecycleState::PurgeEligible
            ));
        }
    }
}
