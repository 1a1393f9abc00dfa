//! Error types for core value validation

use thiserror::Error;

/// Error type for core value validation and parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Device address could not be parsed
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// Channel index outside 1..=5
    #[error("Invalid channel index: {0} (expected 1..={max})", max = crate::state::CHANNEL_COUNT)]
    InvalidChannel(u8),

    /// Brightness value outside 0..=1000
    #[error("Channel value out of range: {value} (expected 0..={max})", max = crate::state::CHANNEL_MAX)]
    ValueOutOfRange {
        /// The rejected value
        value: i64,
    },

    /// Unrecognized mode name
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidChannel(9);
        assert!(err.to_string().contains('9'));

        let err = CoreError::ValueOutOfRange { value: 1001 };
        assert!(err.to_string().contains("1001"));
        assert!(err.to_string().contains("1000"));
    }
}
