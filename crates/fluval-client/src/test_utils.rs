//! Test utilities: an in-memory transport simulating a fixture
//!
//! [`MockTransport`] stands in for the BLE link in unit and integration
//! tests. The transport itself is moved into the client; the paired
//! [`MockHandle`] stays with the test to queue inbound frames, inspect what
//! was written and inject failures.
//!
//! # Example
//!
//! ```rust,ignore
//! let (transport, mock) = MockTransport::new();
//! let (client, handle, events) = FluvalClient::new(transport, config);
//! tokio::spawn(client.run());
//!
//! mock.push_status(true, Some(Mode::Manual), [100, 200, 300, 400, 500]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use fluval_core::{ChannelValue, Mode, CHANNEL_COUNT};

use crate::codec::{decode_frame, encode_status, Notification, StatusReport};
use crate::error::{FluvalError, Result};
use crate::interface::FixtureTransport;

/// How often an idle mock read polls its queue. Under `start_paused` tests
/// the sleeps auto-advance, so this costs nothing.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    incoming: VecDeque<Vec<u8>>,
    outgoing: Vec<Vec<u8>>,
    connect_count: u32,
    connect_failures: u32,
    fail_writes: bool,
    link_dropped: bool,
}

/// In-memory transport simulating one fixture
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Test-side control of a [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport and its control handle
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }
}

impl MockHandle {
    /// Queue a raw (already encrypted) notification fragment
    pub fn push_raw(&self, data: Vec<u8>) {
        self.state.lock().unwrap().incoming.push_back(data);
    }

    /// Queue an encoded state report as a single notification
    pub fn push_report(&self, report: &StatusReport) {
        self.push_raw(encode_status(report));
    }

    /// Queue a state report built from plain values
    pub fn push_status(&self, power: bool, mode: Option<Mode>, values: [u16; 5]) {
        let mut channels = [ChannelValue::new(0).unwrap(); CHANNEL_COUNT as usize];
        for (slot, v) in channels.iter_mut().zip(values) {
            *slot = ChannelValue::new(v).unwrap();
        }
        self.push_report(&StatusReport {
            mode,
            power,
            channels,
        });
    }

    /// Frames the client wrote, oldest first
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().outgoing.clone()
    }

    /// Written frames run back through the codec
    pub fn sent_decoded(&self) -> Vec<Notification> {
        self.sent()
            .iter()
            .filter_map(|frame| decode_frame(frame).ok())
            .collect()
    }

    /// Forget previously written frames
    pub fn clear_sent(&self) {
        self.state.lock().unwrap().outgoing.clear();
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().unwrap().connect_failures = n;
    }

    /// Make every write fail until cleared
    pub fn fail_writes(&self, enabled: bool) {
        self.state.lock().unwrap().fail_writes = enabled;
    }

    /// Drop the link: the next read errors and the transport disconnects
    pub fn drop_link(&self) {
        self.state.lock().unwrap().link_dropped = true;
    }

    /// Whether the client currently holds the link
    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    /// How many times connect succeeded
    pub fn connect_count(&self) -> u32 {
        self.state.lock().unwrap().connect_count
    }
}

#[async_trait]
impl FixtureTransport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(FluvalError::ConnectionTimeout { duration_ms: 10000 });
        }
        state.connected = true;
        state.link_dropped = false;
        state.connect_count += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.state.lock().unwrap().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.link_dropped {
                    state.link_dropped = false;
                    state.connected = false;
                    return Err(FluvalError::Disconnected);
                }
                if !state.connected {
                    return Err(FluvalError::Disconnected);
                }
                if let Some(data) = state.incoming.pop_front() {
                    return Ok(Some(Bytes::from(data)));
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(FluvalError::Disconnected);
        }
        if state.fail_writes {
            return Err(FluvalError::WriteError("simulated write failure".into()));
        }
        state.outgoing.push(frame.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "MockTransport"
    }
}
