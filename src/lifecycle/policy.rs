//! Retention policy: the enumerated expiration choices, the soft-delete grace
//! period and the expiry warning threshold.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::RetentionConfig,
    db::{DbError, DbResult},
};

/// Days a soft-deleted poll stays restorable before it becomes purge eligible.
pub const GRACE_PERIOD_DAYS: i64 = 30;

/// Increment applied by the bulk "extend" admin action.
pub const ADMIN_EXTENSION_DAYS: i64 = 90;

/// Expiration lifetimes a poll may be created (or extended) with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpirationChoice {
    #[serde(rename = "7")]
    Days7,
    #[serde(rename = "30")]
    Days30,
    #[default]
    #[serde(rename = "90")]
    Days90,
    #[serde(rename = "180")]
    Days180,
    #[serde(rename = "365")]
    Days365,
    #[serde(rename = "never")]
    Never,
}

impl ExpirationChoice {
    /// Every finite choice, shortest first.
    pub const FINITE: [ExpirationChoice; 5] = [
        ExpirationChoice::Days7,
        ExpirationChoice::Days30,
        ExpirationChoice::Days90,
        ExpirationChoice::Days180,
        ExpirationChoice::Days365,
    ];

    pub fn days(&self) -> Option<i64> {
        match self {
            ExpirationChoice::Days7 => Some(7),
            ExpirationChoice::Days30 => Some(30),
            ExpirationChoice::Days90 => Some(90),
            ExpirationChoice::Days180 => Some(180),
            ExpirationChoice::Days365 => Some(365),
            ExpirationChoice::Never => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.days().map(Duration::days)
    }

    /// Expiry for a poll created at `now`. `None` means the poll never expires.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration().map(|d| now + d)
    }

    /// Map an arbitrary duration back onto a finite choice, if it is one.
    pub fn from_duration(duration: Duration) -> Option<Self> {
        Self::FINITE
            .into_iter()
            .find(|choice| choice.duration() == Some(duration))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationChoice::Days7 => "7",
            ExpirationChoice::Days30 => "30",
            ExpirationChoice::Days90 => "90",
            ExpirationChoice::Days180 => "180",
            ExpirationChoice::Days365 => "365",
            ExpirationChoice::Never => "never",
        }
    }
}

impl fmt::Display for ExpirationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpirationChoice {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "7" => Ok(ExpirationChoice::Days7),
            "30" => Ok(ExpirationChoice::Days30),
            "90" => Ok(ExpirationChoice::Days90),
            "180" => Ok(ExpirationChoice::Days180),
            "365" => Ok(ExpirationChoice::Days365),
            "never" => Ok(ExpirationChoice::Never),
            other => Err(DbError::InvalidDuration(other.to_string())),
        }
    }
}

/// Static retention rules consumed by the classifier, the repository and the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Length of the half-open `[deleted_at, deleted_at + grace)` soft-delete window.
    pub grace_period: Duration,
    /// Active polls expiring within this window are reported as "expiring soon".
    pub warning_threshold: Duration,
    /// Whether extending a never-expiring poll converts it to a finite expiry.
    pub allow_extend_never_expiring: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::days(GRACE_PERIOD_DAYS),
            warning_threshold: Duration::days(7),
            allow_extend_never_expiring: true,
        }
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            grace_period: Duration::days(GRACE_PERIOD_DAYS),
            warning_threshold: Duration::days(config.warning_threshold_days as i64),
            allow_extend_never_expiring: config.allow_extend_never_expiring,
        }
    }
}

impl RetentionPolicy {
    pub fn default_expiration(&self) -> ExpirationChoice {
        ExpirationChoice::default()
    }

    /// Reject extension lengths outside the enumerated finite choices.
    pub fn validate_extension(&self, duration: Duration) -> DbResult<ExpirationChoice> {
        ExpirationChoice::from_duration(duration).ok_or_else(|| {
            DbError::InvalidDuration(format!("{} days", duration.num_days()))
        })
    }
}
