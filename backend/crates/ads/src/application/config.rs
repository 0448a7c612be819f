//! Application Configuration
//!
//! Configuration for the ads application layer. Read once at startup and
//! shared immutably afterwards; changing it requires a restart.

use crate::domain::environment::Environment;
use crate::domain::history::RetentionPolicy;
use crate::error::{AdsError, AdsResult};
use std::time::Duration;

const DAY_SECS: u64 = 24 * 3600;

/// Ads application configuration
#[derive(Debug, Clone)]
pub struct AdsConfig {
    /// Deployment environment; selects the request host set
    pub environment: Environment,
    /// Maximum retained history entries
    pub history_max_entries: usize,
    /// Maximum age of a retained history entry
    pub history_max_age: Duration,
    /// How long a confirmation may stay in flight before it is released
    pub transport_timeout: Duration,
    /// How long redeemed tokens are kept before eviction
    pub redeemed_token_retention: Duration,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            history_max_entries: 2_000,
            history_max_age: Duration::from_secs(30 * DAY_SECS),
            transport_timeout: Duration::from_secs(30),
            redeemed_token_retention: Duration::from_secs(7 * DAY_SECS),
        }
    }
}

impl AdsConfig {
    /// Create config for development
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            ..Default::default()
        }
    }

    /// Load from process environment variables
    pub fn from_env() -> AdsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// `ADS_ENVIRONMENT` is required unless `fallback` already carries the
    /// environment to use; every other key is optional.
    pub fn from_lookup<F>(lookup: F) -> AdsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with(lookup, None)
    }

    /// Like [`Self::from_lookup`], defaulting to `fallback` when
    /// `ADS_ENVIRONMENT` is unset
    pub fn from_lookup_with<F>(lookup: F, fallback: Option<Environment>) -> AdsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("ADS_ENVIRONMENT") {
            Some(name) => name.parse()?,
            None => fallback.ok_or_else(|| {
                AdsError::InvalidConfig("ADS_ENVIRONMENT must be set".into())
            })?,
        };

        let defaults = Self::default();
        let config = Self {
            environment,
            history_max_entries: parse_or(
                &lookup,
                "ADS_HISTORY_MAX_ENTRIES",
                defaults.history_max_entries,
            )?,
            history_max_age: Duration::from_secs(
                parse_or(&lookup, "ADS_HISTORY_MAX_AGE_DAYS", 30u64)?.saturating_mul(DAY_SECS),
            ),
            transport_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ADS_TRANSPORT_TIMEOUT_SECS",
                defaults.transport_timeout.as_secs(),
            )?),
            redeemed_token_retention: Duration::from_secs(
                parse_or(&lookup, "ADS_REDEEMED_RETENTION_DAYS", 7u64)?.saturating_mul(DAY_SECS),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the ledger or the coordinator unusable
    pub fn validate(&self) -> AdsResult<()> {
        if self.history_max_entries == 0 {
            return Err(AdsError::InvalidConfig(
                "history_max_entries must be at least 1".into(),
            ));
        }
        if self.transport_timeout.is_zero() {
            return Err(AdsError::InvalidConfig(
                "transport_timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.history_max_entries, self.history_max_age)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AdsResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AdsError::InvalidConfig(format!("{key} has invalid value {raw:?}"))),
        None => Ok(default),
    }
}
