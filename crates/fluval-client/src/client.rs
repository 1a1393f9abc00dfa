//! FluvalClient - session and keepalive service
//!
//! This module provides the long-running client service that owns the
//! transport link to one fixture. It handles:
//!
//! - Inbound: decrypting notifications, reassembling split reports and
//!   folding them into the device state
//! - Outbound: serializing commands onto the single writable characteristic,
//!   flushing the pending queue on reconnect
//! - Liveness: periodic state-request pings and a silence deadline that
//!   tears the session down and reconnects with backoff
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      FluvalClient                         │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  ┌────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │ Transport  │◄──►│ Client Core  │───►│ DeviceEvent  │  │
//! │  │ (BLE)      │    │              │    │ channel      │  │
//! │  └────────────┘    │ Codec        │    └──────────────┘  │
//! │                    │ Assembler    │    ┌──────────────┐  │
//! │                    │ DeviceState  │◄───│ ClientHandle │  │
//! │                    └──────────────┘    └──────────────┘  │
//! │                                                           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use fluval_client::{FluvalClient, FluvalConfig, BleTransport};
//!
//! let config = FluvalConfig::new("AA:BB:CC:DD:EE:FF".parse()?);
//! let transport = BleTransport::new(config.address);
//! let (client, handle, mut events) = FluvalClient::new(transport, config);
//!
//! tokio::spawn(client.run());
//! handle.set_power(true).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use fluval_core::{
    ChannelId, ChannelValue, ConnectionStatus, DeviceEvent, Mode,
};

use crate::codec::{decode_frame_fragment, encode_command, Command, FrameAssembler, Notification};
use crate::config::FluvalConfig;
use crate::device::{DeviceState, StateSnapshot};
use crate::error::{FluvalError, Result};
use crate::interface::FixtureTransport;

/// Commands that can be sent to the client service
#[derive(Debug)]
pub enum ClientCommand {
    /// Stage a fixture command (validated before it reaches the channel)
    Stage(Command),
    /// Record an advertisement sighting with its signal strength
    Advertisement {
        /// Received signal strength in dBm
        rssi: i16,
    },
    /// Connect now if the session is down, report the outcome
    EnsureConnected(oneshot::Sender<Result<()>>),
    /// Get a snapshot of the tracked device state
    GetSnapshot(oneshot::Sender<StateSnapshot>),
    /// Get client statistics
    GetStats(oneshot::Sender<ClientStats>),
    /// Shut the client down
    Shutdown,
}

/// Client statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ClientStats {
    /// Raw notifications received from the transport
    pub frames_received: u64,
    /// Command frames written to the transport
    pub frames_sent: u64,
    /// State reports successfully decoded and applied
    pub reports_applied: u64,
    /// Frames rejected by the codec (checksum, header, truncation)
    pub decode_errors: u64,
    /// Notifications with a valid frame but an unrecognized opcode
    pub unknown_frames: u64,
    /// Sessions re-established after loss
    pub reconnects: u64,
    /// Sessions torn down by the silence deadline
    pub keepalive_timeouts: u64,
    /// Advertisement sightings recorded
    pub advertisements: u64,
}

/// Handle for controlling a running [`FluvalClient`]
#[derive(Clone)]
pub struct ClientHandle {
    command_tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    /// Turn the LED on or off
    pub async fn set_power(&self, on: bool) -> Result<()> {
        self.send(ClientCommand::Stage(Command::SetPower(on))).await
    }

    /// Set one channel's brightness
    ///
    /// `index` is 1-based (1..=5), `value` is 0..=1000. Both are validated
    /// here so an out-of-range request fails before anything is staged.
    pub async fn set_channel(&self, index: u8, value: i64) -> Result<()> {
        let channel = ChannelId::new(index)?;
        let value = ChannelValue::try_from(value)?;
        self.send(ClientCommand::Stage(Command::SetChannel(channel, value)))
            .await
    }

    /// Switch the fixture's operating mode
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.send(ClientCommand::Stage(Command::SetMode(mode))).await
    }

    /// Ask the fixture to push a fresh state report
    pub async fn request_state(&self) -> Result<()> {
        self.send(ClientCommand::Stage(Command::RequestState)).await
    }

    /// Record an advertisement sighting (e.g. from a passive scanner)
    pub async fn advertisement(&self, rssi: i16) -> Result<()> {
        self.send(ClientCommand::Advertisement { rssi }).await
    }

    /// Connect now if the session is down, waiting for the outcome
    pub async fn ensure_connected(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::EnsureConnected(tx)).await?;
        rx.await.map_err(|_| FluvalError::ChannelClosed)?
    }

    /// Get a snapshot of the tracked device state
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::GetSnapshot(tx)).await?;
        rx.await.map_err(|_| FluvalError::ChannelClosed)
    }

    /// Get client statistics
    pub async fn stats(&self) -> Result<ClientStats> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::GetStats(tx)).await?;
        rx.await.map_err(|_| FluvalError::ChannelClosed)
    }

    /// Shut the client down
    pub async fn shutdown(&self) -> Result<()> {
        self.send(ClientCommand::Shutdown).await
    }

    async fn send(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| FluvalError::ChannelClosed)
    }
}

/// Client service owning the session to one fixture
pub struct FluvalClient<T: FixtureTransport> {
    /// Transport link
    transport: T,
    /// Session configuration
    config: FluvalConfig,
    /// Tracked device state and pending command queue
    device: DeviceState,
    /// Reassembles reports split across notifications
    assembler: FrameAssembler,
    /// Command receiver
    command_rx: mpsc::Receiver<ClientCommand>,
    /// Outbound change events
    event_tx: mpsc::Sender<DeviceEvent>,
    /// Client statistics
    stats: ClientStats,
    /// Last time anything arrived from the fixture
    last_inbound: Instant,
    /// Running flag
    running: bool,
}

impl<T: FixtureTransport + 'static> FluvalClient<T> {
    /// Create a client over the given transport
    ///
    /// Returns the service itself (drive it with [`run`](Self::run)), a
    /// cloneable control handle and the change-event receiver.
    pub fn new(
        transport: T,
        config: FluvalConfig,
    ) -> (Self, ClientHandle, mpsc::Receiver<DeviceEvent>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_size);
        let (event_tx, event_rx) = mpsc::channel(64);
        let handle = ClientHandle { command_tx };

        let client = Self {
            device: DeviceState::new(config.address),
            transport,
            config,
            assembler: FrameAssembler::new(),
            command_rx,
            event_tx,
            stats: ClientStats::default(),
            last_inbound: Instant::now(),
            running: false,
        };

        (client, handle, event_rx)
    }

    /// Run the client service
    ///
    /// Performs the initial connect (bounded retries), then loops over
    /// inbound frames, control commands, the keepalive tick and the
    /// reconnect timer until shutdown. An unreachable fixture never ends the
    /// run: exhausting the initial retry budget leaves the fixture in
    /// Disconnected, and the session is re-attempted on the backoff timer or
    /// the next advertisement sighting. Commands staged while down queue up
    /// and flush on reconnect.
    pub async fn run(mut self) -> Result<()> {
        info!(transport = %self.transport.name(), "Starting Fluval client");
        self.running = true;

        let mut ping = tokio::time::interval(self.config.keepalive.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Err(e) = self.establish_session().await {
            error!(error = %e, "Initial connect failed, waiting for the fixture");
        }
        ping.reset();

        let mut reconnect_delay = self.config.reconnect.initial_delay;

        while self.running {
            tokio::select! {
                frame = self.transport.read_frame(), if self.device.is_connected() => {
                    match frame {
                        Ok(Some(data)) => {
                            self.last_inbound = Instant::now();
                            self.handle_fragment(&data).await;
                        }
                        Ok(None) => {
                            trace!("Empty read from transport");
                        }
                        Err(e) => {
                            warn!(error = %e, "Transport read failed");
                            self.session_lost().await;
                            reconnect_delay = self.config.reconnect.initial_delay;
                        }
                    }
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                reconnect_delay = self.config.reconnect.initial_delay;
                                ping.reset();
                            }
                        }
                        None => {
                            debug!("All handles dropped, stopping");
                            break;
                        }
                    }
                }

                _ = ping.tick(), if self.device.is_connected() => {
                    if self.keepalive_tick().await {
                        reconnect_delay = self.config.reconnect.initial_delay;
                    }
                }

                _ = tokio::time::sleep(reconnect_delay), if !self.device.is_connected() => {
                    if self.try_reconnect().await {
                        reconnect_delay = self.config.reconnect.initial_delay;
                        ping.reset();
                    } else {
                        reconnect_delay = (reconnect_delay * 2).min(self.config.reconnect.max_delay);
                    }
                }
            }
        }

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Error disconnecting transport");
        }
        if let Some(event) = self.device.set_status(ConnectionStatus::Disconnected) {
            self.emit(event).await;
        }

        info!(transport = %self.transport.name(), "Fluval client stopped");
        Ok(())
    }

    /// Connect with bounded exponential backoff
    ///
    /// Emits `Connecting`/`Connected` transitions and flushes the pending
    /// command queue once the session is up.
    async fn establish_session(&mut self) -> Result<()> {
        if let Some(event) = self.device.set_status(ConnectionStatus::Connecting) {
            self.emit(event).await;
        }

        let reconnect = self.config.reconnect.clone();
        let mut delay = reconnect.initial_delay;

        for attempt in 1..=reconnect.max_attempts {
            debug!(attempt, max = reconnect.max_attempts, "Connecting");
            match self.transport.connect().await {
                Ok(()) => {
                    self.assembler.reset();
                    self.last_inbound = Instant::now();
                    if let Some(event) = self.device.set_status(ConnectionStatus::Connected) {
                        self.emit(event).await;
                    }
                    info!(attempt, "Session established");
                    self.flush_pending().await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Connect attempt failed");
                    if !e.is_retriable() || attempt == reconnect.max_attempts {
                        if let Some(event) =
                            self.device.set_status(ConnectionStatus::Disconnected)
                        {
                            self.emit(event).await;
                        }
                        if !e.is_retriable() {
                            return Err(e);
                        }
                        break;
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(reconnect.max_delay);
                }
            }
        }

        error!(
            attempts = reconnect.max_attempts,
            "Connection attempts exhausted"
        );
        Err(FluvalError::RetriesExhausted {
            attempts: reconnect.max_attempts,
        })
    }

    /// One reconnect attempt from the backoff timer
    ///
    /// The status stays `Connecting` across failed attempts so consumers see
    /// a single transition per outage.
    async fn try_reconnect(&mut self) -> bool {
        if let Some(event) = self.device.set_status(ConnectionStatus::Connecting) {
            self.emit(event).await;
        }

        match self.transport.connect().await {
            Ok(()) => {
                self.stats.reconnects += 1;
                self.assembler.reset();
                self.last_inbound = Instant::now();
                if let Some(event) = self.device.set_status(ConnectionStatus::Connected) {
                    self.emit(event).await;
                }
                info!("Session re-established");
                self.flush_pending().await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Reconnect attempt failed");
                false
            }
        }
    }

    /// Tear the session down; the reconnect timer takes it from there
    async fn session_lost(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Error releasing lost session");
        }
        self.assembler.reset();
        if let Some(event) = self.device.set_status(ConnectionStatus::Disconnected) {
            self.emit(event).await;
        }
    }

    /// Decrypt one notification fragment and apply any completed report
    async fn handle_fragment(&mut self, data: &[u8]) {
        self.stats.frames_received += 1;

        let Some(frame) = decode_frame_fragment(&mut self.assembler, data) else {
            trace!(len = data.len(), "Buffered partial report");
            return;
        };

        match frame {
            Ok(Notification::Status(report)) => {
                self.stats.reports_applied += 1;
                let events = self.device.apply_report(&report);
                for event in events {
                    self.emit(event).await;
                }
            }
            Ok(Notification::Unknown { opcode }) => {
                self.stats.unknown_frames += 1;
                debug!(opcode = format!("{opcode:#04x}"), "Ignoring unknown frame");
            }
            Err(e) => {
                // A corrupt frame never touches the tracked state
                self.stats.decode_errors += 1;
                warn!(error = %e, "Dropping undecodable frame");
            }
        }
    }

    /// Handle a control command
    ///
    /// Returns `true` when the command brought a down session back up, so
    /// the main loop can reset its backoff and ping timers.
    async fn handle_command(&mut self, command: ClientCommand) -> bool {
        match command {
            ClientCommand::Stage(cmd) => {
                let events = self.device.stage_command(cmd);
                for event in events {
                    self.emit(event).await;
                }
                if self.device.is_connected() {
                    self.flush_pending().await;
                }
                false
            }
            ClientCommand::Advertisement { rssi } => {
                self.stats.advertisements += 1;
                let events = self.device.apply_advertisement(rssi);
                for event in events {
                    self.emit(event).await;
                }
                // A sighting proves the fixture is in range, so a down
                // session gets an immediate connect attempt.
                if !self.device.is_connected() {
                    debug!(rssi, "Fixture sighted while disconnected");
                    self.try_reconnect().await
                } else {
                    false
                }
            }
            ClientCommand::EnsureConnected(tx) => {
                if self.device.is_connected() {
                    let _ = tx.send(Ok(()));
                    false
                } else {
                    let result = self.establish_session().await;
                    let revived = result.is_ok();
                    let _ = tx.send(result);
                    revived
                }
            }
            ClientCommand::GetSnapshot(tx) => {
                let _ = tx.send(self.device.snapshot());
                false
            }
            ClientCommand::GetStats(tx) => {
                let _ = tx.send(self.stats.clone());
                false
            }
            ClientCommand::Shutdown => {
                info!("Client shutdown requested");
                self.running = false;
                false
            }
        }
    }

    /// Send everything in the pending queue, oldest first
    ///
    /// A failed send puts the command back and tears the session down; the
    /// remaining queue survives for the next connect.
    async fn flush_pending(&mut self) {
        while let Some(command) = self.device.take_pending(self.config.command_window) {
            let frame = encode_command(&command);
            match self.transport.write_frame(&frame).await {
                Ok(()) => {
                    self.stats.frames_sent += 1;
                    trace!(?command, "Command sent");
                }
                Err(e) => {
                    warn!(?command, error = %e, "Send failed, requeueing");
                    self.device.requeue(command);
                    self.session_lost().await;
                    return;
                }
            }
        }
    }

    /// Periodic keepalive: enforce the silence deadline, then ping
    ///
    /// Returns `true` when the session was torn down.
    async fn keepalive_tick(&mut self) -> bool {
        let silence = self.last_inbound.elapsed();
        if silence >= self.config.keepalive.liveness_timeout {
            self.stats.keepalive_timeouts += 1;
            warn!(
                silence_ms = silence.as_millis() as u64,
                "Fixture silent past deadline, reconnecting"
            );
            self.session_lost().await;
            return true;
        }

        let frame = encode_command(&Command::RequestState);
        if let Err(e) = self.transport.write_frame(&frame).await {
            warn!(error = %e, "Keepalive ping failed");
            self.session_lost().await;
            return true;
        }
        self.stats.frames_sent += 1;
        trace!("Keepalive ping sent");
        false
    }

    async fn emit(&self, event: DeviceEvent) {
        if self.event_tx.send(event).await.is_err() {
            trace!("Event receiver dropped");
        }
    }
}
