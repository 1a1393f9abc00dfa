//! Error types for Fluval client operations
//!
//! Transport errors degrade the session and are retried; protocol errors
//! mean a corrupt or malformed frame and cause the frame to be dropped;
//! validation errors are returned synchronously to the command originator
//! and never reach the wire.

use thiserror::Error;

/// Main error type for Fluval client operations
#[derive(Error, Debug)]
pub enum FluvalError {
    // ===== Transport Errors =====
    /// No usable Bluetooth adapter on the host
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    /// The fixture was not seen during the scan window
    #[error("Fixture not found: {0}")]
    DeviceNotFound(String),

    /// Connection establishment failed
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed {
        /// Fixture address
        address: String,
        /// Failure reason
        reason: String,
    },

    /// Connection or operation timeout
    #[error("Connection timeout after {duration_ms}ms")]
    ConnectionTimeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Notification subscription failed
    #[error("Failed to subscribe to notifications: {0}")]
    SubscribeFailed(String),

    /// Characteristic write failed
    #[error("Write error: {0}")]
    WriteError(String),

    /// Notification read failed
    #[error("Read error: {0}")]
    ReadError(String),

    /// Session lost (link dropped or notification stream closed)
    #[error("Fixture disconnected")]
    Disconnected,

    /// Connect-retry budget exhausted
    #[error("Connect retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// How many attempts were made
        attempts: u32,
    },

    /// No inbound traffic within the keepalive window
    #[error("Keepalive timeout after {duration_ms}ms without inbound traffic")]
    KeepaliveTimeout {
        /// Silence duration in milliseconds
        duration_ms: u64,
    },

    // ===== Frame/Protocol Errors =====
    /// Frame does not start with the protocol header byte
    #[error("Bad frame header: expected 0x68, got 0x{got:02X}")]
    BadHeader {
        /// The received first byte
        got: u8,
    },

    /// Frame checksum did not verify after decryption
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{got:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the frame body
        expected: u8,
        /// Checksum byte carried in the frame
        got: u8,
    },

    /// Frame shorter than its fixed layout requires
    #[error("Truncated frame: {len} bytes")]
    TruncatedFrame {
        /// Received frame length
        len: usize,
    },

    // ===== Validation Errors =====
    /// Invalid value in a staged command
    #[error(transparent)]
    Validation(#[from] fluval_core::CoreError),

    // ===== General Errors =====
    /// Command channel closed (client task gone)
    #[error("Channel closed")]
    ChannelClosed,

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FluvalError {
    /// Check if this error is recoverable via reconnect
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            FluvalError::ConnectionTimeout { .. }
                | FluvalError::KeepaliveTimeout { .. }
                | FluvalError::Disconnected
                | FluvalError::ReadError(_)
                | FluvalError::WriteError(_)
                | FluvalError::SubscribeFailed(_)
                | FluvalError::ConnectFailed { .. }
                | FluvalError::DeviceNotFound(_)
        )
    }

    /// Check if this is a protocol error (bad data from the fixture)
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            FluvalError::BadHeader { .. }
                | FluvalError::ChecksumMismatch { .. }
                | FluvalError::TruncatedFrame { .. }
        )
    }

    /// Get an error code for logging/metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            FluvalError::AdapterNotFound => "ADAPTER_NOT_FOUND",
            FluvalError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            FluvalError::ConnectFailed { .. } => "CONNECT_FAILED",
            FluvalError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            FluvalError::SubscribeFailed(_) => "SUBSCRIBE_FAILED",
            FluvalError::WriteError(_) => "WRITE_ERROR",
            FluvalError::ReadError(_) => "READ_ERROR",
            FluvalError::Disconnected => "DISCONNECTED",
            FluvalError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            FluvalError::KeepaliveTimeout { .. } => "KEEPALIVE_TIMEOUT",
            FluvalError::BadHeader { .. } => "BAD_HEADER",
            FluvalError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            FluvalError::TruncatedFrame { .. } => "TRUNCATED_FRAME",
            FluvalError::Validation(_) => "VALIDATION",
            FluvalError::ChannelClosed => "CHANNEL_CLOSED",
            FluvalError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias for Fluval client operations
pub type Result<T> = std::result::Result<T, FluvalError>;

// Conversion from tokio mpsc send error
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FluvalError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        FluvalError::ChannelClosed
    }
}

// Conversion from btleplug error (only when the ble feature is enabled)
#[cfg(feature = "ble")]
impl From<btleplug::Error> for FluvalError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::DeviceNotFound => {
                FluvalError::DeviceNotFound("peripheral vanished".to_string())
            }
            btleplug::Error::NotConnected => FluvalError::Disconnected,
            btleplug::Error::TimedOut(d) => FluvalError::ConnectionTimeout {
                duration_ms: d.as_millis() as u64,
            },
            other => FluvalError::ReadError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FluvalError::DeviceNotFound("aa:bb:cc:dd:ee:ff".to_string());
        assert_eq!(err.error_code(), "DEVICE_NOT_FOUND");
    }

    #[test]
    fn test_is_retriable() {
        assert!(FluvalError::Disconnected.is_retriable());
        assert!(FluvalError::ConnectionTimeout { duration_ms: 5000 }.is_retriable());
        assert!(FluvalError::KeepaliveTimeout { duration_ms: 25000 }.is_retriable());
        assert!(!FluvalError::BadHeader { got: 0x12 }.is_retriable());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(FluvalError::BadHeader { got: 0x12 }.is_protocol_error());
        assert!(FluvalError::ChecksumMismatch {
            expected: 0xAB,
            got: 0xCD
        }
        .is_protocol_error());
        assert!(!FluvalError::Disconnected.is_protocol_error());
    }

    #[test]
    fn test_validation_error_converts() {
        let core = fluval_core::CoreError::ValueOutOfRange { value: 1001 };
        let err: FluvalError = core.into();
        assert_eq!(err.error_code(), "VALIDATION");
        assert!(!err.is_retriable());
    }
}
