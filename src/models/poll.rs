use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{validate_choices, validate_question};
use crate::lifecycle::{ExpirationChoice, LifecycleState};

/// A poll: the lifecycle-managed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` = never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when the poll is soft-deleted; cleared on restore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An answer option belonging to a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub choice_text: String,
    pub votes: i64,
    pub position: i64,
}

/// A single cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub choice_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
    pub voted_at: DateTime<Utc>,
}

/// Request to create a new poll
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePoll {
    #[validate(length(min = 1, max = 500), custom(function = "validate_question"))]
    pub question: String,
    /// At least two answer options, in display order
    #[validate(custom(function = "validate_choices"))]
    pub choices: Vec<String>,
    /// Lifetime of the poll; defaults to 90 days
    #[serde(default)]
    pub expiration: ExpirationChoice,
}

/// Derived lifecycle properties for presentation layers. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    pub state: LifecycleState,
    pub is_expired: bool,
    pub is_soft_deleted: bool,
    pub days_until_expiration: Option<i64>,
    pub days_until_permanent_deletion: Option<i64>,
}

/// Child rows removed together with a purged poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DependentCounts {
    pub choices: u64,
    pub votes: u64,
}

impl std::ops::AddAssign for DependentCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.choices += rhs.choices;
        self.votes += rhs.votes;
    }
}

/// Number of polls in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub active: u64,
    pub expired: u64,
    pub soft_deleted: u64,
    pub purge_eligible: u64,
}

impl StateCounts {
    pub fn record(&mut self, state: LifecycleState) {
        match state {
            LifecycleState::Active => self.active += 1,
            LifecycleState::Expired => self.expired += 1,
            LifecycleState::SoftDeleted => self.soft_deleted += 1,
            LifecycleState::PurgeEligible => self.purge_eligible += 1,
        }
    }

    pub fn get(&self, state: LifecycleState) -> u64 {
        match state {
            LifecycleState::Active => self.active,
            LifecycleState::Expired => self.expired,
            LifecycleState::SoftDeleted => self.soft_deleted,
            LifecycleState::PurgeEligible => self.purge_eligible,
        }
    }

    pub fn total(&self) -> u64 {
        self.active + self.expired + self.soft_deleted + self.purge_eligible
    }
}
