//! Device-state change events
//!
//! Events are the client's only outward-facing notification mechanism: the
//! host runtime subscribes to a stream of [`DeviceEvent`] values and maps
//! them onto whatever entity model it uses (switches, sliders, sensors).
//!
//! Attribute events ([`DeviceEvent::PowerChanged`], `ChannelChanged`,
//! `ModeChanged`, `ConnectivityChanged`) are emitted only when the value
//! actually differs from the previous one. Signal strength and last-seen
//! events are expected to change on every advertisement and are not
//! deduplicated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{ChannelId, ChannelValue, Mode};

/// Connectivity status of the fixture's BLE session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No active session
    Disconnected,
    /// A connection attempt is in progress
    Connecting,
    /// Session established and notifications subscribed
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// A change in the fixture's observed or commanded state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The LED power state changed
    PowerChanged {
        /// New power state
        on: bool,
    },
    /// A brightness channel changed
    ChannelChanged {
        /// Which channel
        channel: ChannelId,
        /// New brightness
        value: ChannelValue,
    },
    /// The operating mode changed
    ModeChanged {
        /// New mode
        mode: Mode,
    },
    /// The BLE session state changed
    ConnectivityChanged {
        /// New status
        status: ConnectionStatus,
    },
    /// Advertisement signal strength update
    SignalChanged {
        /// Received signal strength in dBm
        rssi: i16,
    },
    /// The fixture was sighted (advertisement or notification)
    Seen {
        /// When it was last seen
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn test_event_equality() {
        let a = DeviceEvent::PowerChanged { on: true };
        let b = DeviceEvent::PowerChanged { on: true };
        assert_eq!(a, b);
        assert_ne!(a, DeviceEvent::PowerChanged { on: false });
    }
}
