//! Device state engine
//!
//! [`DeviceState`] is the single source of truth for what we believe about
//! one fixture: power, the five brightness channels, operating mode,
//! connectivity and signal. Every mutation funnels through it and comes back
//! as a list of [`DeviceEvent`]s, deduplicated so consumers only hear about
//! actual changes.
//!
//! The engine also owns the pending command queue. Commands staged while the
//! link is down are collapsed to one per attribute (last write wins) so a
//! burst of slider moves replays as a single frame on reconnect.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use fluval_core::{
    ChannelId, ChannelValue, ConnectionStatus, DeviceAddress, DeviceEvent, Mode, CHANNEL_COUNT,
};

use crate::codec::{Command, StatusReport};

/// Upper bound on distinct pending commands. With one slot per attribute the
/// queue can never legitimately exceed power + mode + five channels + state.
const MAX_PENDING: usize = 8;

/// Tracked state of one fixture
#[derive(Debug)]
pub struct DeviceState {
    address: DeviceAddress,
    status: ConnectionStatus,
    power: Option<bool>,
    mode: Option<Mode>,
    channels: [Option<ChannelValue>; CHANNEL_COUNT as usize],
    rssi: Option<i16>,
    last_seen: Option<DateTime<Utc>>,
    pending: VecDeque<(Command, Instant)>,
}

/// Serializable point-in-time copy of the tracked state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Fixture address
    pub address: DeviceAddress,
    /// Connectivity status
    pub status: ConnectionStatus,
    /// LED power, `None` until the first report
    pub power: Option<bool>,
    /// Operating mode, `None` until the first report
    pub mode: Option<Mode>,
    /// Per-channel brightness, `None` until the first report
    pub channels: [Option<u16>; CHANNEL_COUNT as usize],
    /// Last advertised signal strength in dBm
    pub rssi: Option<i16>,
    /// Last time the fixture was heard from
    pub last_seen: Option<DateTime<Utc>>,
    /// Number of commands waiting for the link to come back
    pub pending: usize,
}

impl DeviceState {
    /// Create an empty state tracker for the given fixture
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            status: ConnectionStatus::Disconnected,
            power: None,
            mode: None,
            channels: [None; CHANNEL_COUNT as usize],
            rssi: None,
            last_seen: None,
            pending: VecDeque::new(),
        }
    }

    /// The fixture's address
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Current connectivity status
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the session is up
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Update connectivity, returning an event only on actual change
    pub fn set_status(&mut self, status: ConnectionStatus) -> Option<DeviceEvent> {
        if self.status == status {
            return None;
        }
        debug!(from = %self.status, to = %status, "Connectivity changed");
        self.status = status;
        Some(DeviceEvent::ConnectivityChanged { status })
    }

    /// Fold a state report into the tracked state
    ///
    /// Returns one event per attribute that actually changed, plus a `Seen`
    /// event marking the report time. A report identical to current state
    /// yields only the `Seen` event.
    ///
    /// A report with an unrecognized mode code leaves the tracked mode
    /// untouched rather than clearing it. Channel values are only taken from
    /// manual-mode reports: schedule-driven modes report the scheduler's
    /// momentary output, and folding that in would clobber the user's last
    /// manual levels.
    pub fn apply_report(&mut self, report: &StatusReport) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        if self.power != Some(report.power) {
            self.power = Some(report.power);
            events.push(DeviceEvent::PowerChanged { on: report.power });
        }

        if let Some(mode) = report.mode {
            if self.mode != Some(mode) {
                self.mode = Some(mode);
                events.push(DeviceEvent::ModeChanged { mode });
            }
        }

        if report.mode == Some(Mode::Manual) {
            for channel in ChannelId::all() {
                let value = report.channels[channel.offset()];
                if self.channels[channel.offset()] != Some(value) {
                    self.channels[channel.offset()] = Some(value);
                    events.push(DeviceEvent::ChannelChanged { channel, value });
                }
            }
        }

        let at = Utc::now();
        self.last_seen = Some(at);
        events.push(DeviceEvent::Seen { at });

        trace!(changes = events.len() - 1, "Applied state report");
        events
    }

    /// Record an advertisement sighting
    ///
    /// Signal and seen events are emitted unconditionally; an unchanged RSSI
    /// is still a fresh sighting.
    pub fn apply_advertisement(&mut self, rssi: i16) -> Vec<DeviceEvent> {
        self.rssi = Some(rssi);
        let at = Utc::now();
        self.last_seen = Some(at);
        vec![
            DeviceEvent::SignalChanged { rssi },
            DeviceEvent::Seen { at },
        ]
    }

    /// Stage a command and optimistically apply its effect locally
    ///
    /// The local state reflects the intent immediately; the next state report
    /// from the fixture confirms or corrects it. Queued commands collapse per
    /// attribute so only the newest value for each target survives.
    ///
    /// Returns the change events from the optimistic update.
    pub fn stage_command(&mut self, command: Command) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        match command {
            Command::SetPower(on) => {
                if self.power != Some(on) {
                    self.power = Some(on);
                    events.push(DeviceEvent::PowerChanged { on });
                }
            }
            Command::SetChannel(channel, value) => {
                if self.channels[channel.offset()] != Some(value) {
                    self.channels[channel.offset()] = Some(value);
                    events.push(DeviceEvent::ChannelChanged { channel, value });
                }
            }
            Command::SetMode(mode) => {
                if self.mode != Some(mode) {
                    self.mode = Some(mode);
                    events.push(DeviceEvent::ModeChanged { mode });
                }
            }
            Command::RequestState => {}
        }

        self.enqueue(command);
        events
    }

    /// Put a command back at the front of the queue, e.g. after a failed
    /// send. A newer command for the same attribute wins over the requeue.
    pub fn requeue(&mut self, command: Command) {
        let key = command.attribute_key();
        if self.pending.iter().any(|(c, _)| c.attribute_key() == key) {
            trace!(?key, "Dropping requeue, newer command pending");
            return;
        }
        self.pending.push_front((command, Instant::now()));
    }

    /// Pop the oldest pending command still inside the freshness window
    ///
    /// Commands staged longer than `max_age` ago no longer reflect current
    /// intent and are dropped instead of sent.
    pub fn take_pending(&mut self, max_age: Duration) -> Option<Command> {
        while let Some((command, staged_at)) = self.pending.pop_front() {
            if staged_at.elapsed() > max_age {
                debug!(?command, "Dropping expired staged command");
                continue;
            }
            return Some(command);
        }
        None
    }

    /// Whether any commands are waiting to be sent
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of waiting commands
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Serializable copy of the current state
    pub fn snapshot(&self) -> StateSnapshot {
        let mut channels = [None; CHANNEL_COUNT as usize];
        for (slot, value) in channels.iter_mut().zip(self.channels.iter()) {
            *slot = value.map(|v| v.get());
        }
        StateSnapshot {
            address: self.address,
            status: self.status,
            power: self.power,
            mode: self.mode,
            channels,
            rssi: self.rssi,
            last_seen: self.last_seen,
            pending: self.pending.len(),
        }
    }

    fn enqueue(&mut self, command: Command) {
        let key = command.attribute_key();
        self.pending.retain(|(c, _)| c.attribute_key() != key);
        if self.pending.len() >= MAX_PENDING {
            // Cannot happen with per-attribute collapsing, but never grow
            // without bound if a new attribute kind slips in.
            let dropped = self.pending.pop_front();
            debug!(?dropped, "Pending queue full, dropping oldest");
        }
        self.pending.push_back((command, Instant::now()));
    }
}
