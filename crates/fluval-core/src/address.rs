//! Bluetooth device addresses
//!
//! A Fluval fixture is identified by its 6-byte Bluetooth address. The
//! address is accepted in colon-separated, dash-separated, or bare hex form,
//! case-insensitive, and normalized to lowercase colon-separated for display
//! and for use as a stable unique id by the host runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A 6-byte Bluetooth device address identifying one physical fixture.
///
/// Immutable once created. The canonical form is lowercase colon-separated
/// hex (`aa:bb:cc:dd:ee:ff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Create an address from raw bytes
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Stable unique id for this fixture, used as a correlation key by the
    /// host runtime's entity registry.
    pub fn unique_id(&self) -> String {
        let b = &self.0;
        format!(
            "fluval_{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for DeviceAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();

        if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            // Infallible after the hexdigit check above
            *byte = u8::from_str_radix(&cleaned[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(addr: DeviceAddress) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_form() {
        let addr: DeviceAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_parse_dash_and_bare_forms() {
        let colon: DeviceAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let dash: DeviceAddress = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        let bare: DeviceAddress = "aabbccddeeff".parse().unwrap();
        assert_eq!(colon, dash);
        assert_eq!(colon, bare);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!("aa:bb:cc:dd:ee".parse::<DeviceAddress>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<DeviceAddress>().is_err());
        assert!("gg:bb:cc:dd:ee:ff".parse::<DeviceAddress>().is_err());
        assert!("".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_unique_id() {
        let addr: DeviceAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.unique_id(), "fluval_aabbccddeeff");
    }

    #[test]
    fn test_serde_round_trip() {
        let addr: DeviceAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"aa:bb:cc:dd:ee:ff\"");
        let back: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
