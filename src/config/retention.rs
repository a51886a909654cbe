//! Poll retention configuration.
//!
//! Configures the cleanup sweep that soft-deletes expired polls and purges
//! soft-deleted polls once their grace period has elapsed.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//! warning_threshold_days = 7
//! allow_extend_never_expiring = true
//!
//! [retention.safety]
//! dry_run = false
//! max_transitions_per_run = 10000
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Poll retention configuration.
///
/// The grace period between soft-deletion and purge is fixed at 30 days and
/// is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the in-process cleanup worker runs (`pollkeep worker`).
    /// The `cleanup` command ignores this flag.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// How often the cleanup worker runs a sweep (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Active polls expiring within this many days are reported as
    /// "expiring soon".
    /// Default: 7
    #[serde(default = "default_warning_threshold_days")]
    pub warning_threshold_days: u32,

    /// Whether extending a never-expiring poll converts it to a finite expiry.
    /// When false, such extensions fail with "already never expires".
    /// Default: true
    #[serde(default = "default_true")]
    pub allow_extend_never_expiring: bool,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            warning_threshold_days: default_warning_threshold_days(),
            allow_extend_never_expiring: true,
            safety: RetentionSafety::default(),
        }
    }
}

/// Longest accepted sweep interval (one year).
const MAX_INTERVAL_HOURS: u64 = 24 * 366;

fn default_interval_hours() -> u64 {
    24
}

fn default_warning_threshold_days() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

/// Safety settings for cleanup sweeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, every sweep only reports what it would do.
    /// Useful for testing a new deployment before enabling mutation.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum number of soft-deletes plus purges per sweep.
    /// Remaining eligible polls are picked up by the next run.
    /// Set to 0 for unlimited.
    /// Default: 0
    #[serde(default)]
    pub max_transitions_per_run: u64,
}

impl RetentionConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_hours must be at least 1".into(),
            ));
        }
        if self.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::Validation(format!(
                "retention.interval_hours must be at most {MAX_INTERVAL_HOURS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval_hours, 24);
        assert_eq!(config.warning_threshold_days, 7);
        assert!(config.allow_extend_never_expiring);
        assert!(!config.safety.dry_run);
        assert_eq!(config.safety.max_transitions_per_run, 0);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            enabled = true
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval_hours, 24);
        assert!(config.allow_extend_never_expiring);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            enabled = true
            interval_hours = 6
            warning_threshold_days = 3
            allow_extend_never_expiring = false

            [safety]
            dry_run = true
            max_transitions_per_run = 500
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval_hours, 6);
        assert_eq!(config.warning_threshold_days, 3);
        assert!(!config.allow_extend_never_expiring);
        assert!(config.safety.dry_run);
        assert_eq!(config.safety.max_transitions_per_run, 500);
    }

    #[test]
    fn test_grace_period_not_configurable() {
        let toml = r#"
            grace_period_days = 10
        "#;
        let result: Result<RetentionConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_interval_duration() {
        let mut config = RetentionConfig::default();
        assert_eq!(config.interval(), std::time::Duration::from_secs(24 * 3600));

        config.interval_hours = 6;
        assert_eq!(config.interval(), std::time::Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = RetentionConfig {
            interval_hours: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let config = RetentionConfig {
            interval_hours: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.interval(), std::time::Duration::from_secs(u64::MAX));

        let config = RetentionConfig {
            interval_hours: MAX_INTERVAL_HOURS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
