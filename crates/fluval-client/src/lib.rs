//! BLE control client for Fluval aquarium LED fixtures
//!
//! This crate talks the proprietary GATT protocol of Fluval Aquasky / Plant
//! 3.0 style fixtures: encrypted command frames out, encrypted state reports
//! back, with a keepalive loop holding the session open.
//!
//! # Architecture
//!
//! The client operates in three layers:
//!
//! 1. **Transport** - one BLE link per fixture behind [`FixtureTransport`]
//! 2. **Codec** - cipher, checksum framing and report reassembly
//! 3. **Client Service** - session lifecycle, device state tracking,
//!    serialized command dispatch and the keepalive loop
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // Enable the `ble` feature to use BleTransport
//! // Cargo.toml: fluval-client = { version = "0.1", features = ["ble"] }
//!
//! use fluval_client::{BleTransport, FluvalClient, FluvalConfig};
//! use fluval_core::Mode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FluvalConfig::new("AA:BB:CC:DD:EE:FF".parse()?);
//!     let transport = BleTransport::new(config.address);
//!
//!     let (client, handle, mut events) = FluvalClient::new(transport, config);
//!     tokio::spawn(client.run());
//!
//!     handle.set_power(true).await?;
//!     handle.set_channel(1, 750).await?;
//!     handle.set_mode(Mode::Manual).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `ble` - Bluetooth Low Energy transport (requires `btleplug`)
//!
//! # Protocol Details
//!
//! Every frame starts with the header byte `0x68`, followed by an opcode and
//! its arguments, then an 8-bit additive checksum; the whole frame is XORed
//! with a fixed repeating key. State reports that exceed one notification
//! arrive split: a 17-byte fragment is partial, any other length completes
//! the report.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Protocol layer
pub mod codec;
pub mod config;
pub mod error;

// Transport layer
pub mod interface;

// Service layer
pub mod client;
pub mod device;

// Testing utilities
pub mod test_utils;

// Re-exports for convenience
pub use client::{ClientCommand, ClientHandle, ClientStats, FluvalClient};
pub use codec::{Command, FrameAssembler, Notification, StatusReport};
pub use config::{
    FluvalConfig, FluvalConfigBuilder, KeepaliveConfig, ReconnectConfig, CHAR_COMMAND_IO,
    CHAR_COMMAND_OUT, CHAR_KEEPALIVE, CHAR_NOTIFY, DEFAULT_LIVENESS_TIMEOUT,
    DEFAULT_PING_INTERVAL,
};
pub use device::{DeviceState, StateSnapshot};
pub use error::{FluvalError, Result};
pub use interface::FixtureTransport;
pub use test_utils::{MockHandle, MockTransport};

#[cfg(feature = "ble")]
pub use interface::BleTransport;

// Core types used throughout the public API
pub use fluval_core::{
    ChannelId, ChannelValue, ConnectionStatus, DeviceAddress, DeviceEvent, Mode,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_core_reexports_usable() {
        let address: DeviceAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let config = FluvalConfig::new(address);
        assert_eq!(config.address, address);
    }
}
