//! Error types for head detection

use radipower_head::HeadError;
use thiserror::Error;

use crate::identity::Channel;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Opening or talking to the port failed
    #[error("{port}: {source}")]
    Head {
        port: String,
        #[source]
        source: HeadError,
    },

    /// `ID_NUMBER?` failed on every attempt
    #[error("{port}: no identification after {attempts} attempts: {last}")]
    IdentificationExhausted {
        port: String,
        attempts: u32,
        last: HeadError,
    },

    /// The head answered with a serial number the ID table does not know
    #[error("{port}: unknown hardware ID {serial_number}")]
    UnknownId { port: String, serial_number: String },

    /// The port did not finish identification in time
    #[error("{port}: identification timed out after {after_ms}ms")]
    PortTimeout { port: String, after_ms: u64 },

    /// Channel index outside 0..=15 and not the reserved index
    #[error("invalid channel index {0}")]
    InvalidChannel(u8),

    /// The same serial number appears twice in an ID table
    #[error("serial number {0} listed more than once")]
    DuplicateSerial(String),

    /// Two serial numbers share a channel in an ID table
    #[error("channel {0} assigned more than once")]
    DuplicateChannel(Channel),

    /// ID table file could not be read
    #[error("failed to read ID table {path}: {reason}")]
    TableLoad { path: String, reason: String },

    /// ID table JSON did not parse
    #[error("invalid ID table: {0}")]
    TableParse(#[from] serde_json::Error),
}

impl DetectError {
    /// True for configuration problems rather than communication failures
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DetectError::UnknownId { .. }
                | DetectError::InvalidChannel(_)
                | DetectError::DuplicateSerial(_)
                | DetectError::DuplicateChannel(_)
                | DetectError::TableLoad { .. }
                | DetectError::TableParse(_)
        )
    }
}
