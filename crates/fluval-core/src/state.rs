//! Channel, mode and power value types
//!
//! The fixture exposes five independent brightness channels (0..=1000) and
//! one operating mode. Values are validated at construction so that
//! out-of-range commands are rejected before they reach the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of independent brightness channels on the fixture
pub const CHANNEL_COUNT: u8 = 5;

/// Maximum brightness value for a channel
pub const CHANNEL_MAX: u16 = 1000;

/// Step size the host UI should use for channel sliders
pub const CHANNEL_STEP: u16 = 50;

/// Operating mode of the fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Channels are driven directly by the host
    Manual,
    /// The fixture follows its programmed day/night schedule
    Automatic,
    /// The fixture runs its professional (multi-segment) schedule
    Professional,
}

impl Mode {
    /// The byte code this mode uses on the wire
    pub fn protocol_byte(&self) -> u8 {
        match self {
            Mode::Manual => 0x00,
            Mode::Automatic => 0x01,
            Mode::Professional => 0x02,
        }
    }

    /// Map a protocol byte back to a mode, `None` for unknown codes
    pub fn from_protocol_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Mode::Manual),
            0x01 => Some(Mode::Automatic),
            0x02 => Some(Mode::Professional),
            _ => None,
        }
    }

    /// All modes, in protocol-byte order
    pub fn all() -> [Mode; 3] {
        [Mode::Manual, Mode::Automatic, Mode::Professional]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "manual"),
            Mode::Automatic => write!(f, "automatic"),
            Mode::Professional => write!(f, "professional"),
        }
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "automatic" => Ok(Mode::Automatic),
            "professional" => Ok(Mode::Professional),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

/// One-based index of a brightness channel (1..=5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a channel id, rejecting indices outside 1..=5
    pub fn new(index: u8) -> Result<Self> {
        if (1..=CHANNEL_COUNT).contains(&index) {
            Ok(Self(index))
        } else {
            Err(CoreError::InvalidChannel(index))
        }
    }

    /// The one-based channel index
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Zero-based offset, for array indexing
    pub fn offset(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Iterate over all channel ids in order
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (1..=CHANNEL_COUNT).map(ChannelId)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel_{}", self.0)
    }
}

/// A validated channel brightness value (0..=1000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelValue(u16);

impl ChannelValue {
    /// Create a brightness value, rejecting anything above [`CHANNEL_MAX`]
    pub fn new(value: u16) -> Result<Self> {
        if value <= CHANNEL_MAX {
            Ok(Self(value))
        } else {
            Err(CoreError::ValueOutOfRange {
                value: value as i64,
            })
        }
    }

    /// The raw value
    pub fn get(&self) -> u16 {
        self.0
    }

    /// Little-endian wire encoding of this value
    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Decode from the low/high byte pair used in state reports
    pub fn from_le_bytes(lo: u8, hi: u8) -> Result<Self> {
        Self::new(u16::from_le_bytes([lo, hi]))
    }
}

impl TryFrom<i64> for ChannelValue {
    type Error = CoreError;

    /// Validate an externally supplied value, rejecting negatives and
    /// anything above [`CHANNEL_MAX`]
    fn try_from(value: i64) -> Result<Self> {
        let raw = u16::try_from(value).map_err(|_| CoreError::ValueOutOfRange { value })?;
        Self::new(raw).map_err(|_| CoreError::ValueOutOfRange { value })
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_protocol_bytes() {
        for mode in Mode::all() {
            assert_eq!(Mode::from_protocol_byte(mode.protocol_byte()), Some(mode));
        }
        assert_eq!(Mode::from_protocol_byte(0x03), None);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("manual".parse::<Mode>().unwrap(), Mode::Manual);
        assert_eq!("Automatic".parse::<Mode>().unwrap(), Mode::Automatic);
        assert_eq!("PROFESSIONAL".parse::<Mode>().unwrap(), Mode::Professional);
        assert!("night".parse::<Mode>().is_err());
    }

    #[test]
    fn test_channel_id_bounds() {
        assert!(ChannelId::new(0).is_err());
        assert!(ChannelId::new(6).is_err());
        assert_eq!(ChannelId::new(1).unwrap().offset(), 0);
        assert_eq!(ChannelId::new(5).unwrap().offset(), 4);
        assert_eq!(ChannelId::all().count(), 5);
    }

    #[test]
    fn test_channel_value_bounds() {
        assert!(ChannelValue::new(0).is_ok());
        assert!(ChannelValue::new(1000).is_ok());
        assert!(ChannelValue::new(1001).is_err());
    }

    #[test]
    fn test_channel_value_wire_encoding() {
        let value = ChannelValue::new(500).unwrap();
        let [lo, hi] = value.to_le_bytes();
        assert_eq!(ChannelValue::from_le_bytes(lo, hi).unwrap(), value);
        // 500 = 0x01F4
        assert_eq!(lo, 0xF4);
        assert_eq!(hi, 0x01);
    }

    #[test]
    fn test_channel_value_try_from_i64() {
        assert_eq!(ChannelValue::try_from(0_i64).unwrap().get(), 0);
        assert_eq!(ChannelValue::try_from(1000_i64).unwrap().get(), 1000);
        assert!(matches!(
            ChannelValue::try_from(-1_i64),
            Err(CoreError::ValueOutOfRange { value: -1 })
        ));
        assert!(matches!(
            ChannelValue::try_from(1001_i64),
            Err(CoreError::ValueOutOfRange { value: 1001 })
        ));
    }
}
