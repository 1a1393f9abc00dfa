//! Bluetooth Low Energy transport for Fluval fixtures
//!
//! Uses btleplug as the BLE central. One `BleTransport` owns one physical
//! link to one fixture; the scan, connect, subscribe and handshake sequence
//! all happen inside [`FixtureTransport::connect`] so the client loop only
//! sees a single bounded attempt.
//!
//! # GATT layout
//!
//! | Characteristic | UUID suffix | Role                                   |
//! |----------------|-------------|----------------------------------------|
//! | `0x1001`       | write       | command frames, no response            |
//! | `0x1002`       | write/notify| acknowledged commands + notifications  |
//! | `0x1004`       | read        | handshake / keepalive read             |

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use fluval_core::DeviceAddress;

use crate::codec::{encode_command, to_hex, Command};
use crate::config::{
    CHAR_COMMAND_IO, CHAR_COMMAND_OUT, CHAR_KEEPALIVE, CHAR_NOTIFY, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_SCAN_TIMEOUT,
};
use crate::error::{FluvalError, Result};
use crate::interface::FixtureTransport;

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// BLE transport connecting to a fixture by Bluetooth address
pub struct BleTransport {
    address: DeviceAddress,
    scan_timeout: Duration,
    connect_timeout: Duration,
    peripheral: Option<Peripheral>,
    notifications: Option<NotificationStream>,
    name: String,
}

impl BleTransport {
    /// Create a transport for the fixture at the given address
    pub fn new(address: DeviceAddress) -> Self {
        let name = format!("ble:{address}");
        Self {
            address,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            peripheral: None,
            notifications: None,
            name,
        }
    }

    /// Override the scan window
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Override the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Scan until the configured address shows up, or the scan window closes
    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral> {
        let wanted = self.address.to_string();
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| FluvalError::ConnectFailed {
                address: wanted.clone(),
                reason: format!("scan failed: {e}"),
            })?;

        let deadline = tokio::time::Instant::now() + self.scan_timeout;
        let found = loop {
            let hit = adapter
                .peripherals()
                .await
                .unwrap_or_default()
                .into_iter()
                .find(|p| p.address().to_string().eq_ignore_ascii_case(&wanted));
            if let Some(peripheral) = hit {
                break Some(peripheral);
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        };

        adapter.stop_scan().await.ok();
        found.ok_or_else(|| FluvalError::DeviceNotFound(wanted))
    }

    fn find_char(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| FluvalError::SubscribeFailed(format!("characteristic {uuid} not found")))
    }

    /// Post-connect handshake: dummy read of the keepalive characteristic,
    /// then an unacknowledged state request so the fixture starts pushing
    /// reports.
    async fn handshake(&self, peripheral: &Peripheral) -> Result<()> {
        let keepalive = Self::find_char(peripheral, CHAR_KEEPALIVE)?;
        peripheral
            .read(&keepalive)
            .await
            .map_err(|e| FluvalError::ReadError(format!("handshake read: {e}")))?;

        let out = Self::find_char(peripheral, CHAR_COMMAND_OUT)?;
        let request = encode_command(&Command::RequestState);
        trace!(frame = %to_hex(&request), "Handshake state request");
        peripheral
            .write(&out, &request, WriteType::WithoutResponse)
            .await
            .map_err(|e| FluvalError::WriteError(format!("handshake write: {e}")))?;

        Ok(())
    }

    /// Tear down the link without reporting errors (used on failure paths)
    async fn release(&mut self) {
        self.notifications = None;
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.disconnect().await {
                debug!(error = %e, "Ignoring disconnect error during release");
            }
        }
    }
}

#[async_trait]
impl FixtureTransport for BleTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        info!(address = %self.address, "Connecting to fixture");

        let manager = Manager::new()
            .await
            .map_err(|e| FluvalError::ConnectFailed {
                address: self.address.to_string(),
                reason: e.to_string(),
            })?;
        let adapter = manager
            .adapters()
            .await
            .ok()
            .and_then(|mut a| if a.is_empty() { None } else { Some(a.remove(0)) })
            .ok_or(FluvalError::AdapterNotFound)?;

        let peripheral = self.find_peripheral(&adapter).await?;

        // Hard timeout: BlueZ's Connect can block indefinitely when the
        // fixture is out of range or the stack is wedged.
        tokio::time::timeout(self.connect_timeout, peripheral.connect())
            .await
            .map_err(|_| FluvalError::ConnectionTimeout {
                duration_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| FluvalError::ConnectFailed {
                address: self.address.to_string(),
                reason: e.to_string(),
            })?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| FluvalError::ConnectFailed {
                address: self.address.to_string(),
                reason: format!("service discovery: {e}"),
            })?;

        let notify = Self::find_char(&peripheral, CHAR_NOTIFY)?;
        peripheral
            .subscribe(&notify)
            .await
            .map_err(|e| FluvalError::SubscribeFailed(e.to_string()))?;

        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| FluvalError::SubscribeFailed(e.to_string()))?;

        self.peripheral = Some(peripheral);
        self.notifications = Some(notifications);

        // A failed handshake means a half-open session; release it so the
        // caller's retry starts clean.
        if let Some(peripheral) = self.peripheral.clone() {
            if let Err(e) = self.handshake(&peripheral).await {
                warn!(error = %e, "Handshake failed, releasing link");
                self.release().await;
                return Err(e);
            }
        }

        info!(address = %self.address, "Connected to fixture");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.release().await;
        debug!(address = %self.address, "Disconnected from fixture");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.peripheral.is_some() && self.notifications.is_some()
    }

    async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        let notifications = self
            .notifications
            .as_mut()
            .ok_or(FluvalError::Disconnected)?;

        match notifications.next().await {
            Some(notification) if notification.uuid == CHAR_NOTIFY => {
                trace!(len = notification.value.len(), "Notification received");
                Ok(Some(Bytes::from(notification.value)))
            }
            // Notification on some other characteristic; nothing for us
            Some(_) => Ok(None),
            None => {
                // Stream closed: the link is gone
                self.release().await;
                Err(FluvalError::Disconnected)
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let peripheral = self.peripheral.as_ref().ok_or(FluvalError::Disconnected)?;
        let io = Self::find_char(peripheral, CHAR_COMMAND_IO)?;

        trace!(frame = %to_hex(frame), "Writing command frame");
        peripheral
            .write(&io, frame, WriteType::WithResponse)
            .await
            .map_err(|e| FluvalError::WriteError(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .finish()
    }
}
