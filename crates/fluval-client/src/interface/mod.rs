//! Transport implementations for fixture communication
//!
//! This module abstracts the physical link to the fixture:
//!
//! - [`ble::BleTransport`] - Bluetooth Low Energy via btleplug (requires the
//!   `ble` feature; BlueZ development files on Linux: `apt install libdbus-1-dev`)
//! - [`crate::test_utils::MockTransport`] - scripted in-memory transport for tests
//!
//! A transport owns one physical link. It performs no retry or reconnect of
//! its own beyond a single bounded connect attempt; recovery policy lives in
//! the client loop.

#[cfg(feature = "ble")]
mod ble;
#[cfg(feature = "ble")]
pub use ble::BleTransport;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Trait for fixture transports
///
/// Abstracts over the physical link (BLE hardware or a test double),
/// providing a unified API for frame exchange. Frames returned by
/// [`read_frame`](FixtureTransport::read_frame) are raw notification
/// payloads; decryption and reassembly happen in the client.
#[async_trait]
pub trait FixtureTransport: Send + Sync {
    /// Connect to the fixture, subscribe to notifications, and run the
    /// protocol handshake. One bounded attempt; the caller owns retry.
    async fn connect(&mut self) -> Result<()>;

    /// Release the link. Idempotent; safe to call when already disconnected.
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if the link is currently established
    fn is_connected(&self) -> bool;

    /// Wait for the next inbound notification payload.
    ///
    /// Returns `Ok(None)` if no frame is available right now.
    /// Returns `Err` when the session is lost.
    async fn read_frame(&mut self) -> Result<Option<Bytes>>;

    /// Write an encoded command frame to the fixture
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Transport name (for logging)
    fn name(&self) -> &str;
}
