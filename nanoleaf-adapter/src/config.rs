//! Adapter configuration
//!
//! Loaded from a camelCase JSON file; every field has a default so a file
//! only needs `host` and `authToken`.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Polling faster than this overloads the controller
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(500);

pub const MIN_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

pub const MIN_KEEP_ALIVE_POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Controllers announce themselves roughly once a minute
pub const KEEP_ALIVE_WINDOW: Duration = Duration::from_secs(75);

/// How liveness is checked while the event stream delivers updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepAliveStrategy {
    /// Watch SSDP presence notifications
    #[default]
    Discovery,
    /// Poll the info endpoint and ignore its content
    Polling,
}

/// Operator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterConfig {
    pub host: String,

    /// Default: 16021
    pub port: u16,

    pub auth_token: String,

    /// Milliseconds between polls when the event stream is not used
    /// Default: 10000
    pub polling_interval: u64,

    /// Seconds between connection attempts
    /// Default: 60
    pub reconnect_interval: u64,

    /// Default: discovery
    pub keep_alive: KeepAliveStrategy,

    /// Seconds between liveness polls with [`KeepAliveStrategy::Polling`]
    /// Default: 60
    pub keep_alive_polling_interval: u64,

    /// Force polling even when the firmware supports the event stream
    #[serde(rename = "disableSSE")]
    pub disable_sse: bool,

    /// Milliseconds before an HTTP request is abandoned
    /// Default: 10000
    pub request_timeout: u64,

    /// Milliseconds an SSDP search collects replies
    /// Default: 5000
    pub search_timeout: u64,

    /// Interface that joins the SSDP multicast group
    pub interface: Ipv4Addr,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: nanoleaf_api::DEFAULT_PORT,
            auth_token: String::new(),
            polling_interval: 10_000,
            reconnect_interval: 60,
            keep_alive: KeepAliveStrategy::Discovery,
            keep_alive_polling_interval: 60,
            disable_sse: false,
            request_timeout: 10_000,
            search_timeout: 5_000,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Effective timer durations after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub polling: Duration,
    pub reconnect: Duration,
    pub keep_alive_polling: Duration,
    pub keep_alive_window: Duration,
    pub request_timeout: Duration,
    pub search_window: Duration,
}

impl AdapterConfig {
    pub fn new(host: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth_token: auth_token.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Check the settings needed to reach a controller
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("host"));
        }
        if self.port == 0 {
            return Err(ConfigError::Missing("port"));
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::Missing("authorization token"));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "requestTimeout",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Timer durations with the configured values clamped to their floors
    pub fn intervals(&self) -> Intervals {
        let clamp = |name: &str, value: Duration, floor: Duration| {
            if value < floor {
                tracing::debug!("{} of {:?} is too small, using {:?}", name, value, floor);
                floor
            } else {
                value
            }
        };

        Intervals {
            polling: clamp(
                "Polling interval",
                Duration::from_millis(self.polling_interval),
                MIN_POLLING_INTERVAL,
            ),
            reconnect: clamp(
                "Reconnect interval",
                Duration::from_secs(self.reconnect_interval),
                MIN_RECONNECT_INTERVAL,
            ),
            keep_alive_polling: clamp(
                "Keep-alive polling interval",
                Duration::from_secs(self.keep_alive_polling_interval),
                MIN_KEEP_ALIVE_POLLING_INTERVAL,
            ),
            keep_alive_window: KEEP_ALIVE_WINDOW,
            request_timeout: Duration::from_millis(self.request_timeout),
            search_window: Duration::from_millis(self.search_timeout),
        }
    }

    // Builder pattern methods for fluent configuration

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval.as_millis() as u64;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval.as_secs();
        self
    }

    pub fn with_keep_alive(mut self, strategy: KeepAliveStrategy) -> Self {
        self.keep_alive = strategy;
        self
    }

    pub fn with_keep_alive_polling_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_polling_interval = interval.as_secs();
        self
    }

    pub fn with_sse_disabled(mut self, disabled: bool) -> Self {
        self.disable_sse = disabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout.as_millis() as u64;
        self
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = AdapterConfig::default();
        assert_eq!(config.port, 16021);
        assert_eq!(config.keep_alive, KeepAliveStrategy::Discovery);
        assert!(!config.disable_sse);

        let intervals = config.intervals();
        assert_eq!(intervals.polling, Duration::from_secs(10));
        assert_eq!(intervals.reconnect, Duration::from_secs(60));
        assert_eq!(intervals.keep_alive_window, Duration::from_secs(75));
        assert_eq!(intervals.search_window, Duration::from_secs(5));
    }

    #[test]
    fn test_intervals_are_floor_clamped() {
        let config = AdapterConfig::new("10.0.0.5", "token")
            .with_polling_interval(Duration::from_millis(100))
            .with_reconnect_interval(Duration::from_secs(1))
            .with_keep_alive_polling_interval(Duration::from_secs(2));
        let intervals = config.intervals();

        assert_eq!(intervals.polling, MIN_POLLING_INTERVAL);
        assert_eq!(intervals.reconnect, MIN_RECONNECT_INTERVAL);
        assert_eq!(intervals.keep_alive_polling, MIN_KEEP_ALIVE_POLLING_INTERVAL);
    }

    #[rstest]
    #[case(AdapterConfig::new("", "token"), "host")]
    #[case(AdapterConfig::new("10.0.0.5", " "), "authorization token")]
    #[case(AdapterConfig::new("10.0.0.5", "token").with_port(0), "port")]
    fn test_validate_missing(#[case] config: AdapterConfig, #[case] field: &str) {
        match config.validate() {
            Err(ConfigError::Missing(missing)) => assert_eq!(missing, field),
            other => panic!("expected missing {}, got {:?}", field, other),
        }
    }

    #[test]
    fn test_from_json_partial() {
        let config = AdapterConfig::from_json(
            r#"{"host": "nanoleaf.local", "authToken": "abc", "keepAlive": "polling", "disableSSE": true}"#,
        )
        .unwrap();

        assert_eq!(config.host, "nanoleaf.local");
        assert_eq!(config.auth_token, "abc");
        assert_eq!(config.keep_alive, KeepAliveStrategy::Polling);
        assert!(config.disable_sse);
        assert_eq!(config.polling_interval, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_rejects_unknown_strategy() {
        let result = AdapterConfig::from_json(r#"{"keepAlive": "carrier-pigeon"}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AdapterConfig::load("/nonexistent/nanoleaf.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
