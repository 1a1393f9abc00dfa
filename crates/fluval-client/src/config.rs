//! Configuration types for the Fluval client
//!
//! Timing defaults come from observed fixture behavior: the fixture drops a
//! session that stays silent for more than a couple of ping intervals, and a
//! queued command older than the command window is no longer worth sending.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fluval_core::DeviceAddress;

/// Characteristic written with command frames (no response expected)
pub const CHAR_COMMAND_OUT: Uuid = Uuid::from_u128(0x00001001_0000_1000_8000_00805f9b34fb);

/// Characteristic carrying fixture notifications; also accepts acknowledged
/// command writes
pub const CHAR_COMMAND_IO: Uuid = Uuid::from_u128(0x00001002_0000_1000_8000_00805f9b34fb);

/// Characteristic the fixture pushes notifications on (same endpoint as
/// [`CHAR_COMMAND_IO`]; the fixture multiplexes both roles onto it)
pub const CHAR_NOTIFY: Uuid = CHAR_COMMAND_IO;

/// Characteristic read once after connecting as part of the handshake
pub const CHAR_KEEPALIVE: Uuid = Uuid::from_u128(0x00001004_0000_1000_8000_00805f9b34fb);

/// Default interval between keepalive pings
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Default inbound-silence window before the session is declared dead
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(25);

/// Default window after which an unsent staged command is dropped
pub const DEFAULT_COMMAND_WINDOW: Duration = Duration::from_secs(15);

/// Default hard timeout for a single connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan window when looking for the fixture by address
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on the pending command queue
pub const DEFAULT_QUEUE_SIZE: usize = 16;

/// Main configuration for one fixture's client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluvalConfig {
    /// Bluetooth address of the fixture
    pub address: DeviceAddress,

    /// Reconnection settings
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Keepalive settings
    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    /// Bound on the pending command queue (per-attribute collapsed)
    #[serde(default = "default_queue_size")]
    pub command_queue_size: usize,

    /// Staged commands older than this are dropped instead of sent
    #[serde(with = "humantime_serde", default = "default_command_window")]
    pub command_window: Duration,
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

fn default_command_window() -> Duration {
    DEFAULT_COMMAND_WINDOW
}

impl FluvalConfig {
    /// Create a configuration with defaults for the given fixture address
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            reconnect: ReconnectConfig::default(),
            keepalive: KeepaliveConfig::default(),
            command_queue_size: DEFAULT_QUEUE_SIZE,
            command_window: DEFAULT_COMMAND_WINDOW,
        }
    }
}

/// Reconnection behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Initial delay before the second connection attempt
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Maximum delay between connection attempts
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Maximum number of attempts per connect cycle
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Hard timeout for a single connect attempt
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Keepalive behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Interval between keepalive pings while connected
    #[serde(with = "humantime_serde", default = "default_ping_interval")]
    pub ping_interval: Duration,

    /// Inbound-silence window before the session is declared dead
    #[serde(with = "humantime_serde", default = "default_liveness_timeout")]
    pub liveness_timeout: Duration,
}

fn default_ping_interval() -> Duration {
    DEFAULT_PING_INTERVAL
}

fn default_liveness_timeout() -> Duration {
    DEFAULT_LIVENESS_TIMEOUT
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
        }
    }
}

/// Builder for [`FluvalConfig`]
#[derive(Debug)]
pub struct FluvalConfigBuilder {
    config: FluvalConfig,
}

impl FluvalConfigBuilder {
    /// Create a builder with defaults for the given address
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            config: FluvalConfig::new(address),
        }
    }

    /// Set the keepalive ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive.ping_interval = interval;
        self
    }

    /// Set the inbound-silence window
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.config.keepalive.liveness_timeout = timeout;
        self
    }

    /// Set the connect-retry budget
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial reconnect backoff delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.initial_delay = delay;
        self
    }

    /// Set the per-attempt connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect.connect_timeout = timeout;
        self
    }

    /// Set the pending command queue bound
    pub fn command_queue_size(mut self, size: usize) -> Self {
        self.config.command_queue_size = size.max(1);
        self
    }

    /// Set the staged-command expiry window
    pub fn command_window(mut self, window: Duration) -> Self {
        self.config.command_window = window;
        self
    }

    /// Build the configuration
    pub fn build(self) -> FluvalConfig {
        self.config
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address() -> DeviceAddress {
        "aa:bb:cc:dd:ee:ff".parse().unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = FluvalConfig::new(test_address());
        assert_eq!(config.keepalive.ping_interval, DEFAULT_PING_INTERVAL);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.command_queue_size, DEFAULT_QUEUE_SIZE);
    }

    #[test]
    fn test_config_builder() {
        let config = FluvalConfigBuilder::new(test_address())
            .ping_interval(Duration::from_secs(5))
            .max_attempts(7)
            .command_queue_size(4)
            .build();

        assert_eq!(config.keepalive.ping_interval, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 7);
        assert_eq!(config.command_queue_size, 4);
    }

    #[test]
    fn test_builder_clamps_zero_attempts() {
        let config = FluvalConfigBuilder::new(test_address()).max_attempts(0).build();
        assert_eq!(config.reconnect.max_attempts, 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = FluvalConfig::new(test_address());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("aa:bb:cc:dd:ee:ff"));
        assert!(json.contains("10s"));
        let back: FluvalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.address, config.address);
        assert_eq!(back.keepalive.ping_interval, config.keepalive.ping_interval);
    }

    #[test]
    fn test_characteristic_uuids() {
        assert_eq!(
            CHAR_NOTIFY.to_string(),
            "00001002-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            CHAR_KEEPALIVE.to_string(),
            "00001004-0000-1000-8000-00805f9b34fb"
        );
    }
}
