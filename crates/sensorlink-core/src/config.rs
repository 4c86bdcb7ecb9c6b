//! Master configuration
//!
//! Link and timing settings. Every field has a default, so a JSON file only
//! needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::comm_log::DEFAULT_LOG_CAPACITY;
use crate::protocol::{
    DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_TIMEOUT_MS,
};

/// Default auto-read period in milliseconds
pub const DEFAULT_AUTO_READ_PERIOD_MS: u64 = 1000;

/// Default delay between the ultrasonic and TCRT reads of one auto-read cycle
pub const DEFAULT_TCRT_STAGGER_MS: u64 = 500;

/// Errors loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Master configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// How long to wait for a complete 3-byte response
    pub response_timeout_ms: u64,
    /// How often the receive buffer is checked while waiting
    pub poll_interval_ms: u64,
    /// Wait after opening the port before talking to the slaves
    pub settle_delay_ms: u64,
    /// Auto-read cycle period
    pub auto_read_period_ms: u64,
    /// Delay from the ultrasonic read to the TCRT read within a cycle
    pub tcrt_stagger_ms: u64,
    /// Communication log entries retained in memory
    pub log_capacity: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            auto_read_period_ms: DEFAULT_AUTO_READ_PERIOD_MS,
            tcrt_stagger_ms: DEFAULT_TCRT_STAGGER_MS,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl MasterConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check that the timing settings keep requests from colliding on the link.
    ///
    /// The TCRT read may only start once the ultrasonic response window has
    /// closed, and its own window must close before the next cycle begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if self.baud_rate == 0 {
            return invalid("baud_rate must be non-zero".to_string());
        }
        if self.response_timeout_ms == 0 {
            return invalid("response_timeout_ms must be non-zero".to_string());
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.response_timeout_ms {
            return invalid(format!(
                "poll_interval_ms must be between 1 and response_timeout_ms ({})",
                self.response_timeout_ms
            ));
        }
        if self.log_capacity == 0 {
            return invalid("log_capacity must be non-zero".to_string());
        }
        if self.tcrt_stagger_ms < self.response_timeout_ms {
            return invalid(format!(
                "tcrt_stagger_ms ({}) must not be shorter than response_timeout_ms ({})",
                self.tcrt_stagger_ms, self.response_timeout_ms
            ));
        }
        if self.auto_read_period_ms < self.tcrt_stagger_ms + self.response_timeout_ms {
            return invalid(format!(
                "auto_read_period_ms ({}) must cover tcrt_stagger_ms + response_timeout_ms ({})",
                self.auto_read_period_ms,
                self.tcrt_stagger_ms + self.response_timeout_ms
            ));
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn auto_read_period(&self) -> Duration {
        Duration::from_millis(self.auto_read_period_ms)
    }

    pub fn tcrt_stagger(&self) -> Duration {
        Duration::from_millis(self.tcrt_stagger_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_wire_protocol() {
        let config = MasterConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.response_timeout(), Duration::from_millis(500));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.auto_read_period(), Duration::from_secs(1));
        assert_eq!(config.tcrt_stagger(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MasterConfig::from_json_str(r#"{ "settle_delay_ms": 0, "log_capacity": 50 }"#)
            .unwrap();
        assert_eq!(
            config,
            MasterConfig {
                settle_delay_ms: 0,
                log_capacity: 50,
                ..MasterConfig::default()
            }
        );
    }

    #[test]
    fn test_rejects_overlapping_windows() {
        let short_stagger = MasterConfig {
            tcrt_stagger_ms: 300,
            ..MasterConfig::default()
        };
        assert!(matches!(
            short_stagger.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let short_period = MasterConfig {
            auto_read_period_ms: 900,
            ..MasterConfig::default()
        };
        assert!(matches!(
            short_period.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = MasterConfig::from_json_str(r#"{ "response_timeout_ms": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("response_timeout_ms"));
    }

    #[test]
    fn test_parse_error() {
        let err = MasterConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "baud_rate": 19200 }}"#).unwrap();
        let config = MasterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.response_timeout_ms, 500);
    }
}
