//! Fluval Core - Foundational types for the Fluval BLE LED client
//!
//! This crate provides the value types shared between the BLE client and
//! any host runtime embedding it:
//!
//! - [`address`] - Bluetooth device addresses and the derived unique id
//! - [`state`] - Channel, mode and power value types with validation
//! - [`event`] - Device-state change events emitted to the host runtime
//! - [`error`] - Core error types
//!
//! # Example
//!
//! ```rust
//! use fluval_core::{DeviceAddress, ChannelId, ChannelValue, Mode};
//!
//! let addr: DeviceAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
//! assert_eq!(addr.to_string(), "aa:bb:cc:dd:ee:ff");
//!
//! let channel = ChannelId::new(2).unwrap();
//! let value = ChannelValue::new(500).unwrap();
//! assert_eq!(Mode::Manual.protocol_byte(), 0x00);
//! ```

pub mod address;
pub mod error;
pub mod event;
pub mod state;

// Re-exports for convenience
pub use address::DeviceAddress;
pub use error::{CoreError, Result};
pub use event::{ConnectionStatus, DeviceEvent};
pub use state::{ChannelId, ChannelValue, Mode, CHANNEL_COUNT, CHANNEL_MAX, CHANNEL_STEP};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
