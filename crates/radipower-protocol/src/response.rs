//! Reply classification and payload decoding
//!
//! Replies are single lines. A normal reply is one field; an error reply
//! carries a sentinel and the offending command, separated by `;`:
//!
//! ```text
//! -25.31 dBm
//! ERROR 1;[ACQ_SPEED 20]
//! ```

use std::fmt;
use std::str::FromStr;

use crate::averaging::FilterSetting;
use crate::error::{DeviceError, DeviceErrorKind, ProtocolError};
use crate::timing::BaudCode;
use crate::video::VbwSetting;

/// Field separator within a reply
pub const FIELD_SEPARATOR: char = ';';

/// Every error sentinel starts with this text
pub const ERROR_PREFIX: &str = "ERROR";

/// Split a reply into a payload or a device error
///
/// Total: every line is either `Ok(payload)` or exactly one error kind.
pub fn classify(raw: &str) -> Result<&str, DeviceError> {
    let line = raw.trim();
    let mut fields = line.split(FIELD_SEPARATOR);
    let first = fields.next().unwrap_or("").trim();
    let second = fields.next();

    if first.starts_with(ERROR_PREFIX) {
        let kind = DeviceErrorKind::from_sentinel(first).unwrap_or_else(|| {
            tracing::warn!("Unrecognized error sentinel: {:?}", line);
            DeviceErrorKind::Unexpected
        });
        return Err(DeviceError {
            kind,
            fragment: second.map(strip_brackets).filter(|s| !s.is_empty()),
            raw: line.to_string(),
        });
    }

    if second.is_some() {
        tracing::warn!("Unexpected multi-field reply: {:?}", line);
        return Err(DeviceError {
            kind: DeviceErrorKind::Unexpected,
            fragment: None,
            raw: line.to_string(),
        });
    }

    Ok(first)
}

fn strip_brackets(field: &str) -> String {
    let field = field.trim();
    let field = field.strip_prefix('[').unwrap_or(field);
    let field = field.strip_suffix(']').unwrap_or(field);
    field.trim().to_string()
}

/// Split `"<number> <unit>"` (space optional) into its parts
fn split_quantity(payload: &str) -> Option<(f64, &str)> {
    let payload = payload.trim();
    let unit_start = payload
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(payload.len());
    let value = payload[..unit_start].trim().parse::<f64>().ok()?;
    Some((value, payload[unit_start..].trim()))
}

/// Measurement unit a head reports power in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerUnit {
    /// Decibels relative to 1 mW
    Dbm,
    /// Decibels relative to 1 µV
    DbuV,
    /// Watts
    Watt,
    /// Milliwatts
    MilliWatt,
    /// Microwatts
    MicroWatt,
}

impl PowerUnit {
    /// Unit token as the head prints it
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Dbm => "dBm",
            Self::DbuV => "dBuV",
            Self::Watt => "W",
            Self::MilliWatt => "mW",
            Self::MicroWatt => "uW",
        }
    }
}

impl fmt::Display for PowerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for PowerUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dBm" | "0" => Ok(Self::Dbm),
            "dBuV" | "dBµV" | "1" => Ok(Self::DbuV),
            "W" | "2" => Ok(Self::Watt),
            "mW" => Ok(Self::MilliWatt),
            "uW" | "µW" => Ok(Self::MicroWatt),
            _ => Err(()),
        }
    }
}

/// One power reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerReading {
    /// Numeric value
    pub value: f64,
    /// Unit of `value`
    pub unit: PowerUnit,
}

impl fmt::Display for PowerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit)
    }
}

/// Decode a `POWER?` payload; a missing unit means dBm
pub fn decode_power(payload: &str) -> Result<PowerReading, ProtocolError> {
    let malformed = || ProtocolError::malformed("POWER?", payload);
    let (value, unit) = split_quantity(payload).ok_or_else(malformed)?;
    let unit = if unit.is_empty() {
        PowerUnit::Dbm
    } else {
        unit.parse().map_err(|_| malformed())?
    };
    Ok(PowerReading { value, unit })
}

/// Decode a `POWER_UNIT?` payload
pub fn decode_power_unit(payload: &str) -> Result<PowerUnit, ProtocolError> {
    payload
        .parse()
        .map_err(|_| ProtocolError::malformed("POWER_UNIT?", payload))
}

/// Decode a frequency payload into Hz
///
/// Accepts `Hz`, `kHz`, `MHz` and `GHz`; a bare number is Hz.
pub fn decode_frequency(command: &str, payload: &str) -> Result<u64, ProtocolError> {
    let malformed = || ProtocolError::malformed(command, payload);
    let (value, unit) = split_quantity(payload).ok_or_else(malformed)?;
    let scale = match unit {
        "" | "Hz" => 1.0,
        "kHz" => 1e3,
        "MHz" => 1e6,
        "GHz" => 1e9,
        _ => return Err(malformed()),
    };
    let hz = value * scale;
    if !hz.is_finite() || hz < 0.0 {
        return Err(malformed());
    }
    Ok(hz.round() as u64)
}

/// Divisor for `TEMPERATURE?`, which reports tenths of a degree
pub const TEMPERATURE_DIVISOR: f64 = 10.0;

/// Decode a `TEMPERATURE?` payload into °C
///
/// The payload is a bare integer count of tenths of a degree.
pub fn decode_temperature(payload: &str) -> Result<f64, ProtocolError> {
    let tenths = payload
        .trim()
        .parse::<i32>()
        .map_err(|_| ProtocolError::malformed("TEMPERATURE?", payload))?;
    Ok(f64::from(tenths) / TEMPERATURE_DIVISOR)
}

/// Drop a leading echo of the command word, e.g. `FILTER 5` -> `5`
fn strip_echo<'a>(payload: &'a str, word: &str) -> &'a str {
    let payload = payload.trim();
    payload.strip_prefix(word).unwrap_or(payload).trim()
}

/// Decode a `FILTER?` payload
pub fn decode_filter(payload: &str) -> Result<FilterSetting, ProtocolError> {
    strip_echo(payload, "FILTER")
        .parse()
        .map_err(|_| ProtocolError::malformed("FILTER?", payload))
}

/// Decode an `ACQ_SPEED?` payload in kS/s
pub fn decode_acq_speed(payload: &str) -> Result<u16, ProtocolError> {
    let malformed = || ProtocolError::malformed("ACQ_SPEED?", payload);
    let (value, _) = split_quantity(strip_echo(payload, "ACQ_SPEED")).ok_or_else(malformed)?;
    if value.fract() != 0.0 || !(0.0..=f64::from(u16::MAX)).contains(&value) {
        return Err(malformed());
    }
    Ok(value as u16)
}

/// Decode a `VBW?` payload
pub fn decode_vbw(payload: &str) -> Result<VbwSetting, ProtocolError> {
    strip_echo(payload, "VBW")
        .parse()
        .map_err(|_| ProtocolError::malformed("VBW?", payload))
}

/// Decode a `BAUD?` payload
pub fn decode_baud(payload: &str) -> Result<BaudCode, ProtocolError> {
    let malformed = || ProtocolError::malformed("BAUD?", payload);
    let code = strip_echo(payload, "BAUD").parse::<u8>().map_err(|_| malformed())?;
    BaudCode::from_code(code).map_err(|_| malformed())
}
