//! 节流配置：并发上限、超时、重试次数与请求间隔。
//!
//! Throttle configuration.
//!
//! Values can be set programmatically, loaded from YAML/JSON, or overlaid from
//! the environment:
//! - `BATCH_THROTTLE_MAX_INFLIGHT`
//! - `BATCH_THROTTLE_TIMEOUT_MS`
//! - `BATCH_THROTTLE_MAX_RETRIES`
//! - `BATCH_THROTTLE_REQUEST_DELAY_MS`

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_MAX_INFLIGHT: &str = "BATCH_THROTTLE_MAX_INFLIGHT";
pub const ENV_TIMEOUT_MS: &str = "BATCH_THROTTLE_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "BATCH_THROTTLE_MAX_RETRIES";
pub const ENV_REQUEST_DELAY_MS: &str = "BATCH_THROTTLE_REQUEST_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Maximum number of batches dispatched and not yet resolved.
    pub max_in_flight: usize,
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,
    /// Retries granted after the first attempt.
    pub max_retries: u32,
    /// Pacing delay between admission and factory invocation.
    pub request_delay_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            timeout_ms: 30_000,
            max_retries: 2,
            request_delay_ms: 0,
        }
    }
}

impl ThrottleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit concurrent dispatches. Clamped to at least 1.
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }

    /// Clamped to at least 1 ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = saturating_millis(timeout).max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay_ms = saturating_millis(delay);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Defaults overlaid with any `BATCH_THROTTLE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Overlay `BATCH_THROTTLE_*` environment variables onto `self`.
    ///
    /// Unset variables leave the current value alone; unparsable ones are rejected.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Some(n) = env_parse::<usize>(ENV_MAX_INFLIGHT)? {
            self.max_in_flight = n;
        }
        if let Some(ms) = env_parse::<u64>(ENV_TIMEOUT_MS)? {
            self.timeout_ms = ms;
        }
        if let Some(n) = env_parse::<u32>(ENV_MAX_RETRIES)? {
            self.max_retries = n;
        }
        if let Some(ms) = env_parse::<u64>(ENV_REQUEST_DELAY_MS)? {
            self.request_delay_ms = ms;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(Error::validation_with_context(
                "max_in_flight must be at least 1",
                ErrorContext::new()
                    .with_field_path("max_in_flight")
                    .with_source("config"),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(Error::validation_with_context(
                "timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("timeout_ms")
                    .with_source("config"),
            ));
        }
        Ok(())
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_parse<V: std::str::FromStr>(key: &str) -> Result<Option<V>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<V>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                "unparsable environment value",
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(raw.clone())
                    .with_source("config"),
            )
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_config_defaults() {
        let config = ThrottleConfig::default();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_delay(), Duration::ZERO);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_config_builder() {
        let config = ThrottleConfig::new()
            .with_max_in_flight(0)
            .with_timeout(Duration::from_millis(250))
            .with_max_retries(5)
            .with_request_delay(Duration::from_millis(10));
        // clamped
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_delay_ms, 10);
    }

    #[test]
    fn test_config_from_yaml_partial() {
        let config = ThrottleConfig::from_yaml_str("max_in_flight: 8\ntimeout_ms: 500\n").unwrap();
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_config_from_json() {
        let config =
            ThrottleConfig::from_json_str(r#"{"max_retries": 0, "request_delay_ms": 20}"#).unwrap();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.request_delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_config_rejects_zero_in_flight() {
        let err = ThrottleConfig::from_yaml_str("max_in_flight: 0").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("max_in_flight")
        );
    }

    #[test]
    fn test_config_duration_edges() {
        let config = ThrottleConfig::new().with_timeout(Duration::from_micros(300));
        assert_eq!(config.timeout_ms, 1);
        assert_ok!(config.validate());

        let config = ThrottleConfig::new()
            .with_timeout(Duration::MAX)
            .with_request_delay(Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
        assert_eq!(config.request_delay_ms, u64::MAX);
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let config = ThrottleConfig {
            timeout_ms: 0,
            ..ThrottleConfig::default()
        };
        assert_err!(config.validate());
    }

    // Env vars are process-global; keep every env case in one test.
    #[test]
    fn test_config_env_overlay() {
        std::env::set_var(ENV_MAX_INFLIGHT, "3");
        std::env::set_var(ENV_REQUEST_DELAY_MS, "15");
        let config = ThrottleConfig::from_env().unwrap();
        assert_eq!(config.max_in_flight, 3);
        assert_eq!(config.request_delay_ms, 15);
        assert_eq!(config.timeout_ms, 30_000);

        std::env::set_var(ENV_MAX_RETRIES, "many");
        let result = ThrottleConfig::from_env();
        assert!(matches!(result, Err(Error::Configuration { .. })));

        std::env::remove_var(ENV_MAX_INFLIGHT);
        std::env::remove_var(ENV_REQUEST_DELAY_MS);
        std::env::remove_var(ENV_MAX_RETRIES);
    }
}
