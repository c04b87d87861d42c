//! Error types for Radipower protocol handling

use std::fmt;

use thiserror::Error;

/// Kind of error a head reports in place of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// `ERROR 1`
    InvalidCommand,
    /// `ERROR 50`
    BadArgument,
    /// `ERROR 51`
    ArgumentTooHigh,
    /// `ERROR 52`
    ArgumentTooLow,
    /// `ERROR_601`
    FrequencyNotSet,
    /// `ERROR_602`
    OverRange,
    /// `ERROR_603`
    UnderRange,
    /// `ERROR_604`
    NoCalibrationData,
    /// Error-shaped or multi-field reply that matches no known sentinel
    Unexpected,
}

impl DeviceErrorKind {
    /// All kinds that have a fixed sentinel on the wire
    pub const SENTINEL_KINDS: [DeviceErrorKind; 8] = [
        Self::InvalidCommand,
        Self::BadArgument,
        Self::ArgumentTooHigh,
        Self::ArgumentTooLow,
        Self::FrequencyNotSet,
        Self::OverRange,
        Self::UnderRange,
        Self::NoCalibrationData,
    ];

    /// Map an exact sentinel text to its kind
    pub fn from_sentinel(text: &str) -> Option<Self> {
        match text {
            "ERROR 1" => Some(Self::InvalidCommand),
            "ERROR 50" => Some(Self::BadArgument),
            "ERROR 51" => Some(Self::ArgumentTooHigh),
            "ERROR 52" => Some(Self::ArgumentTooLow),
            "ERROR_601" => Some(Self::FrequencyNotSet),
            "ERROR_602" => Some(Self::OverRange),
            "ERROR_603" => Some(Self::UnderRange),
            "ERROR_604" => Some(Self::NoCalibrationData),
            _ => None,
        }
    }

    /// The sentinel text the head sends for this kind
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCommand => Some("ERROR 1"),
            Self::BadArgument => Some("ERROR 50"),
            Self::ArgumentTooHigh => Some("ERROR 51"),
            Self::ArgumentTooLow => Some("ERROR 52"),
            Self::FrequencyNotSet => Some("ERROR_601"),
            Self::OverRange => Some("ERROR_602"),
            Self::UnderRange => Some("ERROR_603"),
            Self::NoCalibrationData => Some("ERROR_604"),
            Self::Unexpected => None,
        }
    }

    /// Human-readable description
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidCommand => "invalid command",
            Self::BadArgument => "bad argument",
            Self::ArgumentTooHigh => "argument too high",
            Self::ArgumentTooLow => "argument too low",
            Self::FrequencyNotSet => "measurement frequency not set",
            Self::OverRange => "over range",
            Self::UnderRange => "under range",
            Self::NoCalibrationData => "no calibration data for this frequency",
            Self::Unexpected => "unexpected response",
        }
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Error record produced when a reply carries an error sentinel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {}", .fragment.as_deref().unwrap_or(.raw.as_str()))]
pub struct DeviceError {
    /// Classified kind
    pub kind: DeviceErrorKind,
    /// Offending command echoed by the head, brackets removed
    pub fragment: Option<String>,
    /// The full reply line, verbatim
    pub raw: String,
}

impl DeviceError {
    /// The error a head reports when it refuses `line`
    ///
    /// Used to refuse a command locally with the same kind and text the head
    /// would have sent.
    pub fn refusal(kind: DeviceErrorKind, line: impl Into<String>) -> Self {
        let line = line.into();
        let raw = match kind.sentinel() {
            Some(sentinel) => format!("{sentinel};[{line}]"),
            None => line.clone(),
        };
        Self {
            kind,
            fragment: Some(line),
            raw,
        }
    }
}

/// Errors that can occur while parsing a command line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Command word not recognized
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Command recognized but its argument is not
    #[error("invalid argument for {command}: {argument}")]
    InvalidArgument { command: String, argument: String },
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The head replied with an error sentinel
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The reply was a payload but could not be decoded
    #[error("malformed reply to {command}: {payload:?}")]
    Malformed { command: String, payload: String },

    /// Filter code outside 1..=7
    #[error("invalid filter code {0}, expected 1..=7 or AUTO")]
    InvalidFilterCode(String),

    /// More averages requested than the model can deliver
    #[error("{requested} averages requested, model ceiling is {ceiling}")]
    AveragesAboveCeiling { requested: u32, ceiling: u32 },

    /// Acquisition speed not offered by the model
    #[error("acquisition speed {requested} kS/s not supported by {family}")]
    UnsupportedAcqSpeed {
        requested: u16,
        family: &'static str,
    },

    /// Baud code outside 0..=3
    #[error("invalid baud code {0}, expected 0..=3")]
    InvalidBaudCode(u8),

    /// Video bandwidth code outside 0..=3
    #[error("invalid video bandwidth code {0}, expected 0..=3 or AUTO")]
    InvalidVbwCode(String),

    /// AUTO sample count asked for without a usable reading
    #[error("AUTO averaging needs a fresh power reading in dBm")]
    AutoNeedsReading,

    /// Identification string carries no recognizable model token
    #[error("unknown model: {0:?}")]
    UnknownModel(String),
}

impl ProtocolError {
    /// Build a [`ProtocolError::Malformed`] for a command's reply
    pub fn malformed(command: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Malformed {
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// The device error kind, if this error came from the head
    pub fn device_kind(&self) -> Option<DeviceErrorKind> {
        match self {
            Self::Device(e) => Some(e.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip_through_kind() {
        for kind in DeviceErrorKind::SENTINEL_KINDS {
            let text = kind.sentinel().unwrap();
            assert_eq!(DeviceErrorKind::from_sentinel(text), Some(kind));
        }
        assert_eq!(DeviceErrorKind::Unexpected.sentinel(), None);
    }

    #[test]
    fn device_error_display_prefers_fragment() {
        let err = DeviceError {
            kind: DeviceErrorKind::InvalidCommand,
            fragment: Some("ACQ_SPEED 20".into()),
            raw: "ERROR 1;[ACQ_SPEED 20]".into(),
        };
        assert_eq!(err.to_string(), "invalid command: ACQ_SPEED 20");

        let bare = DeviceError {
            kind: DeviceErrorKind::Unexpected,
            fragment: None,
            raw: "ERROR 9".into(),
        };
        assert_eq!(bare.to_string(), "unexpected response: ERROR 9");
    }

    #[test]
    fn refusal_matches_head_reply() {
        let err = DeviceError::refusal(DeviceErrorKind::ArgumentTooLow, "FREQUENCY 1000 Hz");
        assert_eq!(err.raw, "ERROR 52;[FREQUENCY 1000 Hz]");
        assert_eq!(err.fragment.as_deref(), Some("FREQUENCY 1000 Hz"));
        assert_eq!(crate::classify(&err.raw.clone()), Err(err));
    }
}
