//! Client configuration types for partyline.
//!
//! `ClientConfig` represents `config.toml` in the data directory. Every field
//! has a default so an empty or partial file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the session server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Reconnect backoff policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Period of the keepalive heartbeat.
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Capacity of the session event channel handed to the caller.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_server_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

fn default_keepalive_interval_ms() -> u64 {
    20_000
}

fn default_event_channel_capacity() -> usize {
    256
}

impl ClientConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            reconnect: ReconnectPolicy::default(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Exponential backoff between reconnect attempts.
///
/// The delay before attempt `n` (0-indexed) is `base_delay_ms * backoff_factor^n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            backoff_factor,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.base_delay_ms as f64 * self.backoff_factor.max(0.0).powi(exponent);
        if !millis.is_finite() || millis >= u64::MAX as f64 {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(millis.round() as u64)
    }

    /// Whether another attempt may be scheduled after `attempts_made` failures.
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default_values() {
        let config = ClientConfig::default();
        assert_eq!(config.keepalive_interval_ms, 20_000);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.base_delay_ms, 1_000);
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_client_config_deserialize_with_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_client_config_deserialize_with_values() {
        let toml_str = r#"
server_url = "wss://chat.example.net/socket"
keepalive_interval_ms = 5000

[reconnect]
max_attempts = 3
base_delay_ms = 250
"#;
        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_url, "wss://chat.example.net/socket");
        assert_eq!(config.keepalive_interval(), Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay_ms, 250);
        assert!((config.reconnect.backoff_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_backoff_delays_double() {
        let policy = ReconnectPolicy::new(3, 1_000, 2.0);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4_000));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = ReconnectPolicy::new(u32::MAX, u64::MAX / 2, 10.0);
        assert_eq!(policy.delay_for(500), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_allows_until_max_attempts() {
        let policy = ReconnectPolicy::new(3, 1_000, 2.0);
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}
