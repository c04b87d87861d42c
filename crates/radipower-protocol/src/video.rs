//! Video bandwidth
//!
//! `VBW <0..3>` sets the post-detection smoothing bandwidth. `VBW AUTO`
//! couples it to the acquisition speed: 1000 kS/s uses code 0, 100 kS/s
//! code 1 and 20 kS/s code 2.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Video bandwidth code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VbwCode {
    /// Code 0, 10 MHz
    Mhz10,
    /// Code 1, 1 MHz
    Mhz1,
    /// Code 2, 200 kHz
    Khz200,
    /// Code 3, 1 kHz
    Khz1,
}

impl VbwCode {
    pub const ALL: [VbwCode; 4] = [Self::Mhz10, Self::Mhz1, Self::Khz200, Self::Khz1];

    /// Map a wire code to a bandwidth
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            0 => Ok(Self::Mhz10),
            1 => Ok(Self::Mhz1),
            2 => Ok(Self::Khz200),
            3 => Ok(Self::Khz1),
            _ => Err(ProtocolError::InvalidVbwCode(code.to_string())),
        }
    }

    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            Self::Mhz10 => 0,
            Self::Mhz1 => 1,
            Self::Khz200 => 2,
            Self::Khz1 => 3,
        }
    }

    pub fn bandwidth_hz(&self) -> u32 {
        match self {
            Self::Mhz10 => 10_000_000,
            Self::Mhz1 => 1_000_000,
            Self::Khz200 => 200_000,
            Self::Khz1 => 1_000,
        }
    }

    /// Code `VBW AUTO` picks at an acquisition speed, if it couples at all
    pub fn for_acq_speed(acq_speed_ksps: u16) -> Option<Self> {
        match acq_speed_ksps {
            1000 => Some(Self::Mhz10),
            100 => Some(Self::Mhz1),
            20 => Some(Self::Khz200),
            _ => None,
        }
    }
}

impl fmt::Display for VbwCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mhz10 => f.write_str("10 MHz"),
            Self::Mhz1 => f.write_str("1 MHz"),
            Self::Khz200 => f.write_str("200 kHz"),
            Self::Khz1 => f.write_str("1 kHz"),
        }
    }
}

/// Video bandwidth state of a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VbwSetting {
    Fixed(VbwCode),
    /// Follows the acquisition speed
    Auto,
}

impl VbwSetting {
    /// Bandwidth in effect at `acq_speed_ksps`
    pub fn effective(&self, acq_speed_ksps: u16) -> Option<VbwCode> {
        match self {
            Self::Fixed(code) => Some(*code),
            Self::Auto => VbwCode::for_acq_speed(acq_speed_ksps),
        }
    }
}

/// Wire form: the code number or `AUTO`
impl fmt::Display for VbwSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(code) => write!(f, "{}", code.code()),
            Self::Auto => f.write_str("AUTO"),
        }
    }
}

impl FromStr for VbwSetting {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "AUTO" {
            return Ok(Self::Auto);
        }
        let code = s
            .parse::<u8>()
            .map_err(|_| ProtocolError::InvalidVbwCode(s.to_string()))?;
        VbwCode::from_code(code).map(Self::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table() {
        let hz: Vec<u32> = VbwCode::ALL.iter().map(|c| c.bandwidth_hz()).collect();
        assert_eq!(hz, [10_000_000, 1_000_000, 200_000, 1_000]);
        for code in VbwCode::ALL {
            assert_eq!(VbwCode::from_code(code.code()), Ok(code));
        }
        assert!(matches!(
            VbwCode::from_code(4),
            Err(ProtocolError::InvalidVbwCode(_))
        ));
    }

    #[test]
    fn test_auto_follows_acq_speed() {
        assert_eq!(VbwSetting::Auto.effective(1000), Some(VbwCode::Mhz10));
        assert_eq!(VbwSetting::Auto.effective(100), Some(VbwCode::Mhz1));
        assert_eq!(VbwSetting::Auto.effective(20), Some(VbwCode::Khz200));
        assert_eq!(VbwSetting::Auto.effective(10), None);
        assert_eq!(
            VbwSetting::Fixed(VbwCode::Khz1).effective(1000),
            Some(VbwCode::Khz1)
        );
    }

    #[test]
    fn test_setting_text() {
        assert_eq!("AUTO".parse::<VbwSetting>(), Ok(VbwSetting::Auto));
        assert_eq!(
            " 2 ".parse::<VbwSetting>(),
            Ok(VbwSetting::Fixed(VbwCode::Khz200))
        );
        assert!("auto".parse::<VbwSetting>().is_err());
        assert!("7".parse::<VbwSetting>().is_err());
        assert_eq!(VbwSetting::Fixed(VbwCode::Mhz1).to_string(), "1");
    }
}
