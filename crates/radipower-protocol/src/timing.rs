//! Serial line rates and exchange-time budgeting

use std::fmt;
use std::time::Duration;

use crate::error::ProtocolError;

/// Bytes on the wire for one `POWER?` exchange, command plus reply
pub const EXCHANGE_OVERHEAD_BYTES: u32 = 18;

/// Start bit, eight data bits, stop bit
pub const BITS_PER_BYTE: u32 = 10;

/// Baud-rate code understood by `BAUD <0..3>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaudCode {
    /// Code 0
    B57600,
    /// Code 1 (power-on default)
    B115200,
    /// Code 2
    B230400,
    /// Code 3
    B460800,
}

impl BaudCode {
    /// Map a wire code to a baud code
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            0 => Ok(Self::B57600),
            1 => Ok(Self::B115200),
            2 => Ok(Self::B230400),
            3 => Ok(Self::B460800),
            _ => Err(ProtocolError::InvalidBaudCode(code)),
        }
    }

    /// Map a line rate to its code
    pub fn from_bps(bps: u32) -> Option<Self> {
        match bps {
            57_600 => Some(Self::B57600),
            115_200 => Some(Self::B115200),
            230_400 => Some(Self::B230400),
            460_800 => Some(Self::B460800),
            _ => None,
        }
    }

    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            Self::B57600 => 0,
            Self::B115200 => 1,
            Self::B230400 => 2,
            Self::B460800 => 3,
        }
    }

    /// Line rate in bits per second
    pub fn bits_per_second(&self) -> u32 {
        match self {
            Self::B57600 => 57_600,
            Self::B115200 => 115_200,
            Self::B230400 => 230_400,
            Self::B460800 => 460_800,
        }
    }
}

impl Default for BaudCode {
    fn default() -> Self {
        Self::B115200
    }
}

impl fmt::Display for BaudCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.bits_per_second())
    }
}

/// Time one power exchange is expected to take
///
/// Serial transfer of [`EXCHANGE_OVERHEAD_BYTES`] at the line rate plus
/// `samples` sample periods at the acquisition speed.
pub fn exchange_time(baud: BaudCode, acq_speed_ksps: u16, samples: u32) -> Duration {
    let transfer =
        f64::from(EXCHANGE_OVERHEAD_BYTES * BITS_PER_BYTE) / f64::from(baud.bits_per_second());
    let sampling = if acq_speed_ksps == 0 {
        0.0
    } else {
        f64::from(samples) / (f64::from(acq_speed_ksps) * 1000.0)
    };
    Duration::from_secs_f64(transfer + sampling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_codes() {
        for code in 0..=3 {
            let baud = BaudCode::from_code(code).unwrap();
            assert_eq!(baud.code(), code);
            assert_eq!(BaudCode::from_bps(baud.bits_per_second()), Some(baud));
        }
        assert_eq!(BaudCode::from_code(4), Err(ProtocolError::InvalidBaudCode(4)));
        assert_eq!(BaudCode::from_bps(9600), None);
    }

    #[test]
    fn test_exchange_time() {
        // 18 bytes, 180 bits at 115200 bps, plus 1000 samples at 20 kS/s
        let t = exchange_time(BaudCode::B115200, 20, 1000);
        let expected = 180.0 / 115_200.0 + 0.05;
        assert!((t.as_secs_f64() - expected).abs() < 1e-9);

        let fast = exchange_time(BaudCode::B460800, 1000, 1);
        let slow = exchange_time(BaudCode::B57600, 1000, 1);
        assert!(fast < slow);
    }

    #[test]
    fn test_exchange_time_grows_with_samples() {
        let mut last = Duration::ZERO;
        for samples in [1, 3, 10, 30, 100, 300, 1000] {
            let t = exchange_time(BaudCode::B115200, 100, samples);
            assert!(t > last);
            last = t;
        }
    }
}
