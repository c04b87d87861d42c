//! Error types for head I/O

use std::fmt;

use radipower_protocol::{DeviceError, DeviceErrorKind, ProtocolError};
use thiserror::Error;

/// Which half of an exchange ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur while talking to a head
#[derive(Debug, Error)]
pub enum HeadError {
    /// No reply (or no write progress) before the deadline
    #[error("{direction} timeout on {port} after {after_ms}ms waiting on {command:?}")]
    Timeout {
        port: String,
        command: String,
        direction: Direction,
        after_ms: u64,
    },

    /// An earlier command timed out and its reply may still arrive
    #[error("link to {port} is out of step after a timeout")]
    Desynced { port: String },

    /// The other end hung up
    #[error("link to {port} closed")]
    Closed { port: String },

    /// I/O error on the link
    #[error("I/O error on {port}: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the serial port
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Error sentinel, malformed payload or rejected argument
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<DeviceError> for HeadError {
    fn from(err: DeviceError) -> Self {
        HeadError::Protocol(ProtocolError::Device(err))
    }
}

impl HeadError {
    /// True for read and write timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, HeadError::Timeout { .. })
    }

    /// True once the link can no longer pair commands with replies
    pub fn is_desynced(&self) -> bool {
        matches!(self, HeadError::Desynced { .. })
    }

    /// The device error kind, if the head replied with a sentinel
    pub fn device_kind(&self) -> Option<DeviceErrorKind> {
        match self {
            HeadError::Protocol(e) => e.device_kind(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radipower_protocol::classify;

    #[test]
    fn test_device_error_converts() {
        let err: HeadError = classify("ERROR_601;[POWER?]").unwrap_err().into();
        assert_eq!(err.device_kind(), Some(DeviceErrorKind::FrequencyNotSet));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_display() {
        let err = HeadError::Timeout {
            port: "/dev/ttyACM0".to_string(),
            command: "POWER?".to_string(),
            direction: Direction::Read,
            after_ms: 3000,
        };
        assert!(err.is_timeout());
        assert_eq!(err.device_kind(), None);
        assert_eq!(
            err.to_string(),
            "read timeout on /dev/ttyACM0 after 3000ms waiting on \"POWER?\""
        );
    }
}
