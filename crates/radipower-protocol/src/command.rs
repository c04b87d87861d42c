//! Radipower command set
//!
//! Commands are case-sensitive ASCII lines terminated by `\n`. Queries end
//! in `?`; settings carry one argument after a space.

use std::fmt;

use crate::averaging::FilterSetting;
use crate::error::ParseError;
use crate::timing::BaudCode;
use crate::video::VbwSetting;

/// Line terminator for commands and replies
pub const LINE_TERMINATOR: u8 = b'\n';

/// One command sent to a head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `ID_NUMBER?` - hardware serial number
    IdNumber,
    /// `*IDN?` - identification string with the model token
    Identify,
    /// `VERSION_HW?`
    VersionHw,
    /// `VERSION_SW?`
    VersionSw,
    /// `FREQUENCY?` - calibration frequency
    Frequency,
    /// `FREQUENCY MIN` - lowest calibrated frequency
    FrequencyMin,
    /// `FREQUENCY MAX` - highest calibrated frequency
    FrequencyMax,
    /// `FREQUENCY <hz> Hz`
    SetFrequency { hz: u64 },
    /// `TEMPERATURE?` - tenths of a degree
    Temperature,
    /// `POWER?` - blocks for the current averaging time
    Power,
    /// `POWER_UNIT?`
    PowerUnit,
    /// `FILTER?`
    Filter,
    /// `FILTER <1..7|AUTO>`
    SetFilter(FilterSetting),
    /// `ACQ_SPEED?` - kS/s
    AcqSpeed,
    /// `ACQ_SPEED <ksps>`
    SetAcqSpeed(u16),
    /// `VBW?` - video bandwidth
    Vbw,
    /// `VBW <0..3|AUTO>`
    SetVbw(VbwSetting),
    /// `BAUD?`
    Baud,
    /// `BAUD <0..3>`
    SetBaud(BaudCode),
}

impl Command {
    /// Command text without terminator
    pub fn to_line(&self) -> String {
        match self {
            Self::IdNumber => "ID_NUMBER?".to_string(),
            Self::Identify => "*IDN?".to_string(),
            Self::VersionHw => "VERSION_HW?".to_string(),
            Self::VersionSw => "VERSION_SW?".to_string(),
            Self::Frequency => "FREQUENCY?".to_string(),
            Self::FrequencyMin => "FREQUENCY MIN".to_string(),
            Self::FrequencyMax => "FREQUENCY MAX".to_string(),
            Self::SetFrequency { hz } => format!("FREQUENCY {} Hz", hz),
            Self::Temperature => "TEMPERATURE?".to_string(),
            Self::Power => "POWER?".to_string(),
            Self::PowerUnit => "POWER_UNIT?".to_string(),
            Self::Filter => "FILTER?".to_string(),
            Self::SetFilter(setting) => format!("FILTER {}", setting),
            Self::AcqSpeed => "ACQ_SPEED?".to_string(),
            Self::SetAcqSpeed(ksps) => format!("ACQ_SPEED {}", ksps),
            Self::Vbw => "VBW?".to_string(),
            Self::SetVbw(setting) => format!("VBW {}", setting),
            Self::Baud => "BAUD?".to_string(),
            Self::SetBaud(code) => format!("BAUD {}", code.code()),
        }
    }

    /// Encode to wire bytes, terminator included
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.to_line().into_bytes();
        bytes.push(LINE_TERMINATOR);
        bytes
    }

    /// Parse a command line (terminator optional)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (word, arg) = match line.split_once(' ') {
            Some((word, arg)) => (word, Some(arg)),
            None => (line, None),
        };

        let invalid = |arg: &str| ParseError::InvalidArgument {
            command: word.to_string(),
            argument: arg.to_string(),
        };

        match (word, arg) {
            ("ID_NUMBER?", None) => Ok(Self::IdNumber),
            ("*IDN?", None) => Ok(Self::Identify),
            ("VERSION_HW?", None) => Ok(Self::VersionHw),
            ("VERSION_SW?", None) => Ok(Self::VersionSw),
            ("FREQUENCY?", None) => Ok(Self::Frequency),
            ("FREQUENCY", Some("MIN")) => Ok(Self::FrequencyMin),
            ("FREQUENCY", Some("MAX")) => Ok(Self::FrequencyMax),
            ("FREQUENCY", Some(arg)) => {
                let hz = crate::response::decode_frequency("FREQUENCY", arg)
                    .map_err(|_| invalid(arg))?;
                Ok(Self::SetFrequency { hz })
            }
            ("TEMPERATURE?", None) => Ok(Self::Temperature),
            ("POWER?", None) => Ok(Self::Power),
            ("POWER_UNIT?", None) => Ok(Self::PowerUnit),
            ("FILTER?", None) => Ok(Self::Filter),
            ("FILTER", Some(arg)) => arg
                .parse()
                .map(Self::SetFilter)
                .map_err(|_| invalid(arg)),
            ("ACQ_SPEED?", None) => Ok(Self::AcqSpeed),
            ("ACQ_SPEED", Some(arg)) => arg
                .parse()
                .map(Self::SetAcqSpeed)
                .map_err(|_| invalid(arg)),
            ("VBW?", None) => Ok(Self::Vbw),
            ("VBW", Some(arg)) => arg
                .parse()
                .map(Self::SetVbw)
                .map_err(|_| invalid(arg)),
            ("BAUD?", None) => Ok(Self::Baud),
            ("BAUD", Some(arg)) => arg
                .parse::<u8>()
                .ok()
                .and_then(|code| BaudCode::from_code(code).ok())
                .map(Self::SetBaud)
                .ok_or_else(|| invalid(arg)),
            _ => Err(ParseError::UnknownCommand(line.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averaging::FilterCode;

    #[test]
    fn test_encode() {
        assert_eq!(Command::IdNumber.encode(), b"ID_NUMBER?\n");
        assert_eq!(Command::Identify.encode(), b"*IDN?\n");
        assert_eq!(
            Command::SetFrequency { hz: 1_000_000_000 }.encode(),
            b"FREQUENCY 1000000000 Hz\n"
        );
        assert_eq!(Command::SetFilter(FilterSetting::Auto).encode(), b"FILTER AUTO\n");
        assert_eq!(
            Command::SetFilter(FilterSetting::Fixed(FilterCode::new(3).unwrap())).encode(),
            b"FILTER 3\n"
        );
        assert_eq!(Command::SetAcqSpeed(1000).encode(), b"ACQ_SPEED 1000\n");
        assert_eq!(Command::SetBaud(BaudCode::B460800).encode(), b"BAUD 3\n");
        assert_eq!(Command::FrequencyMax.encode(), b"FREQUENCY MAX\n");
        assert_eq!(Command::SetVbw(VbwSetting::Auto).encode(), b"VBW AUTO\n");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("POWER?\n"), Ok(Command::Power));
        assert_eq!(Command::parse("FREQUENCY MIN"), Ok(Command::FrequencyMin));
        assert_eq!(
            Command::parse("FREQUENCY 50 MHz"),
            Ok(Command::SetFrequency { hz: 50_000_000 })
        );
        assert_eq!(
            Command::parse("FILTER AUTO\r\n"),
            Ok(Command::SetFilter(FilterSetting::Auto))
        );
        assert_eq!(
            Command::parse("BAUD 2"),
            Ok(Command::SetBaud(BaudCode::B230400))
        );
        assert_eq!(
            Command::parse("VBW 3"),
            Ok(Command::SetVbw(VbwSetting::Fixed(crate::video::VbwCode::Khz1)))
        );
    }

    #[test]
    fn test_parse_rejects() {
        // Commands are case-sensitive
        assert!(matches!(
            Command::parse("Filter?"),
            Err(ParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::parse("FILTER 9"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::parse("BAUD 7"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::parse("VBW 4"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::parse("ACQ_SPEED fast"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::parse("POWER? now"),
            Err(ParseError::UnknownCommand(_))
        ));
    }
}
