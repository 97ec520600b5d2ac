//! Engine configuration.
//!
//! Defaults: 3 attempts, `2^attempts` second backoff, 5 s media polls bounded
//! at 5 min. Every knob can be overridden from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use autoflow_core::DEFAULT_MAX_ATTEMPTS;

pub const ENV_MAX_ATTEMPTS: &str = "AUTOFLOW_MAX_ATTEMPTS";
pub const ENV_BACKOFF_BASE_MS: &str = "AUTOFLOW_BACKOFF_BASE_MS";
pub const ENV_MEDIA_POLL_INTERVAL_MS: &str = "AUTOFLOW_MEDIA_POLL_INTERVAL_MS";
pub const ENV_MEDIA_MAX_WAIT_SECS: &str = "AUTOFLOW_MEDIA_MAX_WAIT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}: expected an unsigned integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempt ceiling given to newly enqueued jobs.
    pub max_attempts: u32,
    /// Backoff before attempt n+1 is `backoff_base_ms * 2^n`.
    pub backoff_base_ms: u64,
    /// Status poll interval for long-running media jobs.
    pub media_poll_interval_ms: u64,
    /// Upper bound on a single media wait.
    pub media_max_wait_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: 1_000,
            media_poll_interval_ms: 5_000,
            media_max_wait_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, file, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = parse_positive(&lookup, ENV_MAX_ATTEMPTS)? {
            cfg.max_attempts = u32::try_from(v).map_err(|_| ConfigError::InvalidNumber {
                key: ENV_MAX_ATTEMPTS,
                value: v.to_string(),
            })?;
        }
        if let Some(v) = parse_positive(&lookup, ENV_BACKOFF_BASE_MS)? {
            cfg.backoff_base_ms = v;
        }
        if let Some(v) = parse_positive(&lookup, ENV_MEDIA_POLL_INTERVAL_MS)? {
            cfg.media_poll_interval_ms = v;
        }
        if let Some(v) = parse_positive(&lookup, ENV_MEDIA_MAX_WAIT_SECS)? {
            cfg.media_max_wait_secs = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject zero durations and attempt counts, however the config was built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_attempts", u64::from(self.max_attempts)),
            ("backoff_base_ms", self.backoff_base_ms),
            ("media_poll_interval_ms", self.media_poll_interval_ms),
            ("media_max_wait_secs", self.media_max_wait_secs),
        ];
        match fields.into_iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Zero { key }),
            None => Ok(()),
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn media_poll_interval(&self) -> Duration {
        Duration::from_millis(self.media_poll_interval_ms)
    }

    pub fn media_max_wait(&self) -> Duration {
        Duration::from_secs(self.media_max_wait_secs)
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.clone(),
    })?;
    if value == 0 {
        return Err(ConfigError::Zero { key });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_three_attempts_with_one_second_base() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.backoff_base(), Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_ATTEMPTS, "5"),
            (ENV_BACKOFF_BASE_MS, "10"),
            (ENV_MEDIA_POLL_INTERVAL_MS, "250"),
            (ENV_MEDIA_MAX_WAIT_SECS, " 30 "),
        ]))
        .unwrap();

        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.backoff_base(), Duration::from_millis(10));
        assert_eq!(cfg.media_poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.media_max_wait(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "three")])),
            Err(ConfigError::InvalidNumber { key: ENV_MAX_ATTEMPTS, .. })
        ));
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_BACKOFF_BASE_MS, "0")])),
            Err(ConfigError::Zero { key: ENV_BACKOFF_BASE_MS })
        );
    }

    #[test]
    fn partial_serde_input_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_value(serde_json::json!({"max_attempts": 4})).unwrap();
        assert_eq!(cfg.max_attempts, 4);
        assert_eq!(cfg.backoff_base_ms, 1_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialized_zero_interval_fails_validation() {
        let cfg: EngineConfig =
            serde_json::from_value(serde_json::json!({"media_poll_interval_ms": 0})).unwrap();
        assert_eq!(cfg.validate(), Err(ConfigError::Zero { key: "media_poll_interval_ms" }));

        let cfg = EngineConfig { max_attempts: 0, ..EngineConfig::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::Zero { key: "max_attempts" }));
    }
}
