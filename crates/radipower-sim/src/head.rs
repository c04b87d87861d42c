//! Virtual Radipower head
//!
//! Answers command lines the way a real head does, including the error
//! sentinels, so driver code can be exercised without hardware.

use std::time::Duration;

use radipower_protocol::{
    exchange_time, BaudCode, Command, DeviceError, DeviceErrorKind, FilterSetting, ModelFamily,
    ParseError, PowerUnit, VbwSetting,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Configuration for creating a virtual head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualHeadConfig {
    /// Reply to `ID_NUMBER?`
    pub serial_number: String,
    /// Model token embedded in the `*IDN?` reply
    pub model: String,
    /// Reply to `VERSION_HW?`
    pub hardware_version: String,
    /// Reply to `VERSION_SW?`
    pub firmware_version: String,
    /// Lowest calibrated frequency in Hz
    pub min_frequency_hz: u64,
    /// Highest calibrated frequency in Hz
    pub max_frequency_hz: u64,
    /// Calibration frequency; `None` until set
    pub frequency_hz: Option<u64>,
    /// Input power seen by the head in dBm
    pub power_dbm: f64,
    /// Head temperature in °C
    pub temperature_c: f64,
    /// Initial averaging setting
    pub filter: FilterSetting,
    /// Initial acquisition speed in kS/s
    pub acq_speed_ksps: u16,
    /// Initial video bandwidth
    pub vbw: VbwSetting,
    /// Initial baud code
    pub baud: BaudCode,
    /// Unit for `POWER?` replies
    pub unit: PowerUnit,
    /// Delay `POWER?` replies by the averaging time
    pub simulate_timing: bool,
}

impl Default for VirtualHeadConfig {
    fn default() -> Self {
        Self {
            serial_number: "0.2.1.7.62.1".to_string(),
            model: "RPR2006C".to_string(),
            hardware_version: "HW 3.1".to_string(),
            firmware_version: "SW 2.13".to_string(),
            min_frequency_hz: 9_000,
            max_frequency_hz: 6_000_000_000,
            frequency_hz: Some(1_000_000_000),
            power_dbm: -35.0,
            temperature_c: 25.3,
            filter: FilterSetting::Auto,
            acq_speed_ksps: 20,
            vbw: VbwSetting::Auto,
            baud: BaudCode::B115200,
            unit: PowerUnit::Dbm,
            simulate_timing: true,
        }
    }
}

/// A simulated head
#[derive(Debug)]
pub struct VirtualHead {
    config: VirtualHeadConfig,
    family: ModelFamily,
    /// Commands still to be refused with `ERROR 1`
    fail_remaining: u32,
    /// Commands still to be ignored
    silent_remaining: u32,
    /// Every line received (for test verification)
    received: Vec<String>,
}

impl VirtualHead {
    /// Create a head with default settings and the given identity
    pub fn new(serial_number: impl Into<String>, model: impl Into<String>) -> Self {
        Self::from_config(VirtualHeadConfig {
            serial_number: serial_number.into(),
            model: model.into(),
            ..Default::default()
        })
    }

    /// Create a head from configuration
    ///
    /// Unrecognized models behave like an RPR2006.
    pub fn from_config(mut config: VirtualHeadConfig) -> Self {
        let family = ModelFamily::from_model(&config.model).unwrap_or(ModelFamily::Rpr2006);
        if let Some(ksps) = family.fixed_acq_speed() {
            config.acq_speed_ksps = ksps;
        }
        Self {
            config,
            family,
            fail_remaining: 0,
            silent_remaining: 0,
            received: Vec::new(),
        }
    }

    /// Hardware serial number
    pub fn serial_number(&self) -> &str {
        &self.config.serial_number
    }

    /// Current configuration and state
    pub fn config(&self) -> &VirtualHeadConfig {
        &self.config
    }

    /// Family derived from the model token
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Change the input power
    pub fn set_power_dbm(&mut self, dbm: f64) {
        self.config.power_dbm = dbm;
    }

    /// Refuse the next `n` commands with `ERROR 1`
    pub fn fail_next(&mut self, n: u32) {
        self.fail_remaining = n;
    }

    /// Ignore the next `n` commands entirely
    pub fn go_silent(&mut self, n: u32) {
        self.silent_remaining = n;
    }

    /// Lines received so far
    pub fn received(&self) -> &[String] {
        &self.received
    }

    /// Filter code currently in effect, resolving AUTO from the input power
    fn effective_samples(&self) -> u32 {
        let code = match self.config.filter {
            FilterSetting::Fixed(code) => code,
            FilterSetting::Auto => radipower_protocol::auto_filter_code(self.config.power_dbm),
        };
        self.family.samples_for(code)
    }

    /// How long a `POWER?` takes under the current settings
    pub fn reading_duration(&self) -> Duration {
        if !self.config.simulate_timing {
            return Duration::ZERO;
        }
        exchange_time(
            self.config.baud,
            self.config.acq_speed_ksps,
            self.effective_samples(),
        )
    }

    /// Produce the reply to one command line; `None` means no reply at all
    pub fn respond(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        self.received.push(line.to_string());
        trace!("virtual head {} <- {:?}", self.config.serial_number, line);

        if self.silent_remaining > 0 {
            self.silent_remaining -= 1;
            return None;
        }
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Some(error_reply(DeviceErrorKind::InvalidCommand, line));
        }

        let reply = match Command::parse(line) {
            Ok(cmd) => self.execute(cmd, line),
            Err(ParseError::UnknownCommand(_)) => {
                error_reply(DeviceErrorKind::InvalidCommand, line)
            }
            Err(ParseError::InvalidArgument { .. }) => {
                error_reply(DeviceErrorKind::BadArgument, line)
            }
        };
        trace!("virtual head {} -> {:?}", self.config.serial_number, reply);
        Some(reply)
    }

    fn execute(&mut self, cmd: Command, line: &str) -> String {
        let c = &mut self.config;
        match cmd {
            Command::IdNumber => c.serial_number.clone(),
            Command::Identify => format!("DARE!! Instruments,{},{}", c.model, c.firmware_version),
            Command::VersionHw => c.hardware_version.clone(),
            Command::VersionSw => c.firmware_version.clone(),
            Command::Frequency => match c.frequency_hz {
                Some(hz) => format!("{} Hz", hz),
                None => error_reply(DeviceErrorKind::FrequencyNotSet, line),
            },
            Command::FrequencyMin => format!("{} Hz", c.min_frequency_hz),
            Command::FrequencyMax => format!("{} Hz", c.max_frequency_hz),
            Command::SetFrequency { hz } => {
                if hz < c.min_frequency_hz {
                    error_reply(DeviceErrorKind::ArgumentTooLow, line)
                } else if hz > c.max_frequency_hz {
                    error_reply(DeviceErrorKind::ArgumentTooHigh, line)
                } else {
                    c.frequency_hz = Some(hz);
                    "OK".to_string()
                }
            }
            Command::Temperature => format!("{}", (c.temperature_c * 10.0).round() as i64),
            Command::Power => {
                let (min_dbm, max_dbm) = self.family.power_range_dbm();
                if c.frequency_hz.is_none() {
                    error_reply(DeviceErrorKind::FrequencyNotSet, line)
                } else if c.power_dbm > max_dbm {
                    error_reply(DeviceErrorKind::OverRange, line)
                } else if c.power_dbm < min_dbm {
                    error_reply(DeviceErrorKind::UnderRange, line)
                } else {
                    format!("{:.2} {}", convert_dbm(c.power_dbm, c.unit), c.unit)
                }
            }
            Command::PowerUnit => c.unit.symbol().to_string(),
            Command::Filter => c.filter.to_string(),
            Command::SetFilter(setting) => {
                c.filter = setting;
                "OK".to_string()
            }
            Command::AcqSpeed | Command::SetAcqSpeed(_)
                if self.family.fixed_acq_speed().is_some() =>
            {
                error_reply(DeviceErrorKind::InvalidCommand, line)
            }
            Command::AcqSpeed => c.acq_speed_ksps.to_string(),
            Command::SetAcqSpeed(ksps) => {
                if self.family.check_acq_speed(ksps).is_ok() {
                    c.acq_speed_ksps = ksps;
                    "OK".to_string()
                } else {
                    error_reply(DeviceErrorKind::BadArgument, line)
                }
            }
            Command::Vbw => c.vbw.to_string(),
            Command::SetVbw(setting) => {
                c.vbw = setting;
                "OK".to_string()
            }
            Command::Baud => c.baud.code().to_string(),
            Command::SetBaud(code) => {
                c.baud = code;
                "OK".to_string()
            }
        }
    }
}

fn error_reply(kind: DeviceErrorKind, line: &str) -> String {
    DeviceError::refusal(kind, line).raw
}

/// Express a dBm level in another unit (50 ohm system)
fn convert_dbm(dbm: f64, unit: PowerUnit) -> f64 {
    let milliwatts = 10f64.powf(dbm / 10.0);
    match unit {
        PowerUnit::Dbm => dbm,
        PowerUnit::DbuV => dbm + 107.0,
        PowerUnit::Watt => milliwatts / 1e3,
        PowerUnit::MilliWatt => milliwatts,
        PowerUnit::MicroWatt => milliwatts * 1e3,
    }
}
