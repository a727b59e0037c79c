//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime policy of the retail engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for one attempt of a unit of work.
    pub tx_timeout: Duration,
    /// How long a Postgres session waits on a row lock before giving up.
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    /// Add returned quantities back to the sale's location.
    pub restock_on_return: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tx_timeout: Duration::from_millis(5000),
            lock_timeout: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
            restock_on_return: false,
        }
    }
}

impl EngineConfig {
    /// Read `DUKA_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse::<u64>(&lookup, key)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let max_attempts = parse::<u32>(&lookup, "DUKA_MAX_ATTEMPTS")?
            .unwrap_or(defaults.retry.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "DUKA_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "at least one attempt is required".into(),
            });
        }

        Ok(Self {
            tx_timeout: millis("DUKA_TX_TIMEOUT_MS", defaults.tx_timeout)?,
            lock_timeout: millis("DUKA_LOCK_TIMEOUT_MS", defaults.lock_timeout)?,
            retry: RetryPolicy::exponential(
                max_attempts,
                millis("DUKA_RETRY_BASE_MS", defaults.retry.base_delay)?,
                defaults.retry.max_delay,
            ),
            restock_on_return: parse_bool(&lookup, "DUKA_RESTOCK_ON_RETURN")?
                .unwrap_or(defaults.restock_on_return),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected a boolean".into(),
            }),
        },
    }
}
