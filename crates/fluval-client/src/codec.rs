//! Frame codec for the Fluval BLE protocol
//!
//! Every frame exchanged with the fixture has the same shape:
//!
//! ```text
//! ┌────────┬────────┬─────────────┬──────────┐
//! │ 0x68   │ opcode │  arguments  │ checksum │
//! └────────┴────────┴─────────────┴──────────┘
//! ```
//!
//! The checksum is the 8-bit sum of all preceding bytes. The whole
//! checksummed frame is then XORed with a fixed repeating key before it goes
//! on the air; the same pass decrypts inbound frames.
//!
//! State reports longer than one GATT notification arrive fragmented: a
//! decrypted fragment of exactly [`FRAGMENT_LEN`] bytes is partial and is
//! buffered by [`FrameAssembler`]; any other length completes the report.

use fluval_core::{ChannelId, ChannelValue, Mode, CHANNEL_COUNT};

use crate::error::{FluvalError, Result};

/// First byte of every frame
pub const FRAME_HEADER: u8 = 0x68;

/// Opcode: set one channel's brightness
pub const OP_SET_CHANNEL: u8 = 0x02;

/// Opcode: LED power on/off
pub const OP_SET_POWER: u8 = 0x03;

/// Opcode: operating mode
pub const OP_SET_MODE: u8 = 0x04;

/// Opcode: request a state report; doubles as the keepalive ping and
/// appears as the opcode of the fixture's state reports
pub const OP_STATE: u8 = 0x05;

/// Length of a partial (to-be-continued) decrypted notification fragment
pub const FRAGMENT_LEN: usize = 17;

/// Plaintext length of a full state report, checksum included
pub const STATE_REPORT_LEN: usize = 16;

/// Fixed per-device-family cipher key, XORed repeatedly over the frame
const CIPHER_KEY: [u8; 8] = [0x17, 0x4B, 0x5A, 0x21, 0x3C, 0x68, 0x0D, 0x77];

/// An outbound command for the fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn the LED on or off
    SetPower(bool),
    /// Set one channel's brightness
    SetChannel(ChannelId, ChannelValue),
    /// Switch the operating mode
    SetMode(Mode),
    /// Ask the fixture to push a state report
    RequestState,
}

impl Command {
    /// Key used to collapse the pending queue to one command per attribute
    pub fn attribute_key(&self) -> AttributeKey {
        match self {
            Command::SetPower(_) => AttributeKey::Power,
            Command::SetChannel(ch, _) => AttributeKey::Channel(*ch),
            Command::SetMode(_) => AttributeKey::Mode,
            Command::RequestState => AttributeKey::State,
        }
    }

    /// Unchecksummed, unencrypted frame body
    fn payload(&self) -> Vec<u8> {
        match self {
            Command::SetPower(on) => vec![FRAME_HEADER, OP_SET_POWER, u8::from(*on)],
            Command::SetChannel(channel, value) => {
                let [lo, hi] = value.to_le_bytes();
                vec![FRAME_HEADER, OP_SET_CHANNEL, channel.index(), lo, hi]
            }
            Command::SetMode(mode) => vec![FRAME_HEADER, OP_SET_MODE, mode.protocol_byte()],
            Command::RequestState => vec![FRAME_HEADER, OP_STATE],
        }
    }
}

/// Attribute identity of a command, for last-write-wins queue collapsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    /// LED power
    Power,
    /// One brightness channel
    Channel(ChannelId),
    /// Operating mode
    Mode,
    /// State request / ping
    State,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Full state report pushed by the fixture
    Status(StatusReport),
    /// Recognized framing, unrecognized opcode. Kept distinct from an error
    /// so newer firmware does not break the session.
    Unknown {
        /// The unrecognized opcode byte
        opcode: u8,
    },
}

/// Decoded contents of a state report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Operating mode, `None` when the fixture reports an unknown code
    pub mode: Option<Mode>,
    /// LED power state
    pub power: bool,
    /// All five channel brightness values
    pub channels: [ChannelValue; CHANNEL_COUNT as usize],
}

/// Apply the fixed repeating-key cipher in place. Involutive: encrypts and
/// decrypts with the same pass.
pub fn apply_cipher(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= CIPHER_KEY[i % CIPHER_KEY.len()];
    }
}

/// 8-bit sum of the frame body
fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Append the checksum byte to a frame body
pub fn add_checksum(mut body: Vec<u8>) -> Vec<u8> {
    let sum = checksum(&body);
    body.push(sum);
    body
}

/// Encode a command into a complete wire frame (checksummed and encrypted)
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut frame = add_checksum(command.payload());
    apply_cipher(&mut frame);
    frame
}

/// Decode a complete wire frame into a typed notification
pub fn decode_frame(data: &[u8]) -> Result<Notification> {
    let mut plain = data.to_vec();
    apply_cipher(&mut plain);
    parse_plain(&plain)
}

/// Decrypt one raw notification fragment and feed it through the assembler
///
/// Returns `None` while a report is still partial, `Some` once the final
/// fragment completes it.
pub fn decode_frame_fragment(
    assembler: &mut FrameAssembler,
    data: &[u8],
) -> Option<Result<Notification>> {
    let mut plain = data.to_vec();
    apply_cipher(&mut plain);
    assembler.push(&plain).map(|frame| parse_plain(&frame))
}

/// Parse an already-decrypted frame, verifying its checksum
pub fn parse_plain(plain: &[u8]) -> Result<Notification> {
    if plain.len() < 3 {
        return Err(FluvalError::TruncatedFrame { len: plain.len() });
    }

    let (body, sum) = plain.split_at(plain.len() - 1);
    let expected = checksum(body);
    if sum[0] != expected {
        return Err(FluvalError::ChecksumMismatch {
            expected,
            got: sum[0],
        });
    }

    if body[0] != FRAME_HEADER {
        return Err(FluvalError::BadHeader { got: body[0] });
    }

    match body[1] {
        OP_STATE => parse_status(body).map(Notification::Status),
        opcode => Ok(Notification::Unknown { opcode }),
    }
}

/// Parse the body of a state report.
///
/// Layout: `68 05 <mode> <power> <reserved> <ch1 lo> <ch1 hi> … <ch5 hi>`
fn parse_status(body: &[u8]) -> Result<StatusReport> {
    if body.len() < STATE_REPORT_LEN - 1 {
        return Err(FluvalError::TruncatedFrame { len: body.len() });
    }

    let mode = Mode::from_protocol_byte(body[2]);
    let power = body[3] > 0x00;

    let mut channels = [ChannelValue::new(0).map_err(FluvalError::Validation)?;
        CHANNEL_COUNT as usize];
    for (i, channel) in channels.iter_mut().enumerate() {
        let lo = body[5 + i * 2];
        let hi = body[6 + i * 2];
        // Reports carrying garbage above 1000 are rejected even when the
        // checksum matched
        *channel = ChannelValue::from_le_bytes(lo, hi).map_err(FluvalError::Validation)?;
    }

    Ok(StatusReport {
        mode,
        power,
        channels,
    })
}

/// Build the plaintext body of a state report, for tests and simulators
pub fn build_status_body(report: &StatusReport) -> Vec<u8> {
    let mut body = vec![
        FRAME_HEADER,
        OP_STATE,
        report.mode.map(|m| m.protocol_byte()).unwrap_or(0xFF),
        u8::from(report.power),
        0x00,
    ];
    for channel in &report.channels {
        body.extend_from_slice(&channel.to_le_bytes());
    }
    body
}

/// Encode a state report into a complete wire frame, for tests and simulators
pub fn encode_status(report: &StatusReport) -> Vec<u8> {
    let mut frame = add_checksum(build_status_body(report));
    apply_cipher(&mut frame);
    frame
}

/// Reassembles fixture reports that span multiple GATT notifications.
///
/// Operates on decrypted fragments: a fragment of exactly [`FRAGMENT_LEN`]
/// bytes is buffered, any other length completes the pending report.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decrypted fragment; returns the completed frame when the
    /// final fragment arrives.
    pub fn push(&mut self, fragment: &[u8]) -> Option<Vec<u8>> {
        if fragment.len() == FRAGMENT_LEN {
            self.buffer.extend_from_slice(fragment);
            None
        } else {
            let mut frame = std::mem::take(&mut self.buffer);
            frame.extend_from_slice(fragment);
            Some(frame)
        }
    }

    /// Drop any partially assembled report (call on reconnect)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Render bytes as space-separated hex for trace logs
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(mode: Mode, power: bool, values: [u16; 5]) -> StatusReport {
        StatusReport {
            mode: Some(mode),
            power,
            channels: values.map(|v| ChannelValue::new(v).unwrap()),
        }
    }

    #[test]
    fn test_cipher_is_involutive() {
        let mut data = vec![0x68, 0x05, 0x12, 0x34, 0x56];
        let original = data.clone();
        apply_cipher(&mut data);
        assert_ne!(data, original);
        apply_cipher(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_command_round_trip_all_attributes() {
        let commands = [
            Command::SetPower(true),
            Command::SetPower(false),
            Command::SetChannel(ChannelId::new(1).unwrap(), ChannelValue::new(0).unwrap()),
            Command::SetChannel(ChannelId::new(3).unwrap(), ChannelValue::new(500).unwrap()),
            Command::SetChannel(ChannelId::new(5).unwrap(), ChannelValue::new(1000).unwrap()),
            Command::SetMode(Mode::Manual),
            Command::SetMode(Mode::Automatic),
            Command::SetMode(Mode::Professional),
            Command::RequestState,
        ];

        for command in commands {
            let wire = encode_command(&command);
            let mut plain = wire.clone();
            apply_cipher(&mut plain);
            // Checksum verifies and the header survives the trip
            let (body, sum) = plain.split_at(plain.len() - 1);
            assert_eq!(body[0], FRAME_HEADER, "{command:?}");
            let expected = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            assert_eq!(sum[0], expected, "{command:?}");
        }
    }

    #[test]
    fn test_status_round_trip() {
        let original = report(Mode::Manual, true, [0, 250, 500, 750, 1000]);
        let wire = encode_status(&original);
        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded, Notification::Status(original));
    }

    #[test]
    fn test_single_byte_corruption_always_detected() {
        let wire = encode_status(&report(Mode::Automatic, true, [100, 200, 300, 400, 500]));

        for i in 0..wire.len() {
            for bit in 0..8 {
                let mut corrupt = wire.clone();
                corrupt[i] ^= 1 << bit;
                let result = decode_frame(&corrupt);
                // Corrupting the header byte may surface as BadHeader once
                // the checksum byte itself is what got hit; everything else
                // is a checksum mismatch. Never a clean decode.
                assert!(result.is_err(), "byte {i} bit {bit} decoded cleanly");
            }
        }
    }

    #[test]
    fn test_unknown_opcode_is_not_an_error() {
        let plain = add_checksum(vec![FRAME_HEADER, 0x7E, 0x01]);
        let mut wire = plain;
        apply_cipher(&mut wire);
        assert_eq!(
            decode_frame(&wire).unwrap(),
            Notification::Unknown { opcode: 0x7E }
        );
    }

    #[test]
    fn test_unknown_mode_byte_reports_none() {
        let mut body = build_status_body(&report(Mode::Manual, true, [1, 2, 3, 4, 5]));
        body[2] = 0x09;
        let mut wire = add_checksum(body);
        apply_cipher(&mut wire);

        match decode_frame(&wire).unwrap() {
            Notification::Status(status) => assert_eq!(status.mode, None),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_frame_rejected() {
        assert!(matches!(
            parse_plain(&[FRAME_HEADER]),
            Err(FluvalError::TruncatedFrame { len: 1 })
        ));
    }

    #[test]
    fn test_bad_header_rejected() {
        let plain = add_checksum(vec![0x12, OP_STATE, 0x00]);
        assert!(matches!(
            parse_plain(&plain),
            Err(FluvalError::BadHeader { got: 0x12 })
        ));
    }

    #[test]
    fn test_set_channel_payload_layout() {
        let command = Command::SetChannel(
            ChannelId::new(2).unwrap(),
            ChannelValue::new(500).unwrap(),
        );
        let mut wire = encode_command(&command);
        apply_cipher(&mut wire);
        // 68 02 <index> <lo> <hi> <sum>
        assert_eq!(&wire[..5], &[0x68, 0x02, 0x02, 0xF4, 0x01]);
    }

    #[test]
    fn test_assembler_single_fragment() {
        let mut assembler = FrameAssembler::new();
        let frame = assembler.push(&[1, 2, 3]).unwrap();
        assert_eq!(frame, vec![1, 2, 3]);
    }

    #[test]
    fn test_assembler_multi_fragment() {
        let mut assembler = FrameAssembler::new();
        let first = vec![0xAA; FRAGMENT_LEN];
        assert!(assembler.push(&first).is_none());
        let frame = assembler.push(&[0xBB, 0xCC]).unwrap();
        assert_eq!(frame.len(), FRAGMENT_LEN + 2);
        assert_eq!(&frame[..FRAGMENT_LEN], first.as_slice());
        assert_eq!(&frame[FRAGMENT_LEN..], &[0xBB, 0xCC]);
    }

    #[test]
    fn test_assembler_reset_drops_partial() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(&[0u8; FRAGMENT_LEN]).is_none());
        assembler.reset();
        assert_eq!(assembler.push(&[1, 2]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x68, 0x05, 0xFF]), "68 05 ff");
    }
}
