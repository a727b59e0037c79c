//! Process configuration for the API binary.

use duka_infra::{ConfigError, EngineConfig};
use duka_observability::LogFormat;
use thiserror::Error;

/// Shared secret used when `JWT_SECRET` is unset. Only acceptable for local work.
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiConfigError {
    #[error(transparent)]
    Engine(#[from] ConfigError),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            database_max_connections: 10,
            log_format: LogFormat::Json,
            engine: EngineConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_max_connections = match non_empty("DATABASE_MAX_CONNECTIONS") {
            None => defaults.database_max_connections,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    return Err(ApiConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                        reason: "must be at least 1".into(),
                    });
                }
                Err(e) => {
                    return Err(ApiConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                        reason: e.to_string(),
                    });
                }
            },
        };

        let log_format = match non_empty("LOG_FORMAT") {
            None => defaults.log_format,
            Some(raw) => raw.parse().map_err(|e: duka_observability::ParseLogFormatError| {
                ApiConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections,
            log_format,
            engine: EngineConfig::from_lookup(&lookup)?,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ApiConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, ApiConfig::default());
        assert!(cfg.uses_dev_secret());
    }

    #[test]
    fn reads_every_key() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://duka@localhost/duka"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("LOG_FORMAT", "pretty"),
            ("DUKA_RESTOCK_ON_RETURN", "true"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert!(!cfg.uses_dev_secret());
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://duka@localhost/duka"));
        assert_eq!(cfg.database_max_connections, 4);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.engine.restock_on_return);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("DATABASE_MAX_CONNECTIONS", "0")]),
            Err(ApiConfigError::Invalid { key: "DATABASE_MAX_CONNECTIONS", .. })
        ));
        assert!(matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ApiConfigError::Invalid { key: "LOG_FORMAT", .. })
        ));
        assert!(matches!(
            config(&[("DUKA_MAX_ATTEMPTS", "0")]),
            Err(ApiConfigError::Engine(_))
        ));
    }
}
