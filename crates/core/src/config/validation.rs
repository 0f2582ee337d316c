//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use chrono_tz::Tz;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `reddit.subreddit` is empty or carries an `r/` prefix
    /// - `timezone` is not a known IANA name
    /// - `sheets.max_retries` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        let subreddit = self.reddit.subreddit.trim();
        if subreddit.is_empty() {
            return Err(ConfigError::Invalid { field: "reddit.subreddit".into(), reason: "must not be empty".into() });
        }
        if subreddit.starts_with("r/") || subreddit.starts_with("/r/") {
            return Err(ConfigError::Invalid {
                field: "reddit.subreddit".into(),
                reason: "give the bare name without the r/ prefix".into(),
            });
        }

        if self.timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Invalid {
                field: "timezone".into(),
                reason: format!("unknown IANA timezone: {}", self.timezone),
            });
        }

        if self.sheets.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "sheets.max_retries".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.sheets.google_api_key.is_none() {
            tracing::debug!("sheets.google_api_key not set; Sheets API fallback disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_subreddit() {
        let mut config = AppConfig::default();
        config.reddit.subreddit = "  ".into();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "reddit.subreddit"));
    }

    #[test]
    fn test_validate_prefixed_subreddit() {
        let mut config = AppConfig::default();
        config.reddit.subreddit = "r/discexchange".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_timezone() {
        let config = AppConfig { timezone: "Nowhere/Special".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timezone"));
    }

    #[test]
    fn test_validate_zero_retries() {
        let mut config = AppConfig::default();
        config.sheets.max_retries = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sheets.max_retries"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
        let config = AppConfig { timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
