//! One open head and its configuration mirror
//!
//! Getters re-query the head and refresh the mirror. Setters update the
//! mirror only after the head accepted the command. [`Session::mirror`]
//! returns the last known values without any I/O; they may be stale.
//!
//! A timeout ends the session: later operations fail with
//! [`HeadError::Desynced`] and the head has to be reopened.

use std::time::Duration;

use radipower_protocol::{
    decode_acq_speed, decode_baud, decode_filter, decode_frequency, decode_power,
    decode_power_unit, decode_temperature, decode_vbw, exchange_time, model_token,
    select_filter, AveragingPolicy, BaudCode, Command, DeviceError, DeviceErrorKind, FilterCode,
    FilterSetting, ModelFamily, PowerReading, PowerUnit, ProtocolError, VbwCode, VbwSetting,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::HeadError;
use crate::transport::{Link, Transport};

/// Static facts about a head, read once when the session is established
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Hardware serial number (`ID_NUMBER?`)
    pub serial_number: String,
    /// Full `*IDN?` reply
    pub idn: String,
    /// Model token, e.g. `RPR2006C`
    pub model: String,
    pub family: ModelFamily,
    pub hardware_version: String,
    pub firmware_version: String,
    /// Lowest calibrated frequency in Hz
    pub min_frequency_hz: u64,
    /// Highest calibrated frequency in Hz
    pub max_frequency_hz: u64,
}

/// Last known configuration and readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mirror {
    /// Calibration frequency; `None` until read or set
    pub frequency_hz: Option<u64>,
    pub filter: FilterSetting,
    pub acq_speed_ksps: u16,
    /// Video bandwidth; `None` until read or set
    pub vbw: Option<VbwSetting>,
    pub baud: BaudCode,
    pub power_unit: Option<PowerUnit>,
    /// Latest reading taken under the current filter setting
    pub last_power: Option<PowerReading>,
    pub temperature_c: Option<f64>,
}

/// An open head
pub struct Session<L> {
    transport: Transport<L>,
    identity: Identity,
    mirror: Mirror,
}

impl<L: Link> Session<L> {
    /// Finish bringing up a head whose serial number is already known
    ///
    /// Reads identification, versions and frequency bounds, then seeds the
    /// mirror with the current averaging, acquisition speed and baud.
    pub async fn establish(
        mut transport: Transport<L>,
        serial_number: impl Into<String>,
    ) -> Result<Self, HeadError> {
        let serial_number = serial_number.into();

        let idn = transport.request(&Command::Identify).await?;
        let model = model_token(&idn)
            .ok_or_else(|| ProtocolError::UnknownModel(idn.clone()))?
            .to_string();
        let family = ModelFamily::from_model(&model)?;

        let hardware_version = transport.request(&Command::VersionHw).await?;
        let firmware_version = transport.request(&Command::VersionSw).await?;

        let payload = transport.request(&Command::FrequencyMin).await?;
        let min_frequency_hz = decode_frequency("FREQUENCY MIN", &payload)?;
        let payload = transport.request(&Command::FrequencyMax).await?;
        let max_frequency_hz = decode_frequency("FREQUENCY MAX", &payload)?;

        let filter = decode_filter(&transport.request(&Command::Filter).await?)?;
        let acq_speed_ksps = match family.fixed_acq_speed() {
            Some(ksps) => ksps,
            None => decode_acq_speed(&transport.request(&Command::AcqSpeed).await?)?,
        };
        let baud = decode_baud(&transport.request(&Command::Baud).await?)?;

        info!(
            "{}: {} ({}) serial {} firmware {}",
            transport.port(),
            model,
            family,
            serial_number,
            firmware_version
        );

        Ok(Self {
            transport,
            identity: Identity {
                serial_number,
                idn,
                model,
                family,
                hardware_version,
                firmware_version,
                min_frequency_hz,
                max_frequency_hz,
            },
            mirror: Mirror {
                frequency_hz: None,
                filter,
                acq_speed_ksps,
                vbw: None,
                baud,
                power_unit: None,
                last_power: None,
                temperature_c: None,
            },
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn family(&self) -> ModelFamily {
        self.identity.family
    }

    /// Port the head is attached to
    pub fn port(&self) -> &str {
        self.transport.port()
    }

    /// Cached values; no I/O, possibly stale
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    // --- identity queries ---

    pub async fn id_number(&mut self) -> Result<String, HeadError> {
        self.transport.request(&Command::IdNumber).await
    }

    pub async fn identify(&mut self) -> Result<String, HeadError> {
        self.transport.request(&Command::Identify).await
    }

    pub async fn hardware_version(&mut self) -> Result<String, HeadError> {
        self.transport.request(&Command::VersionHw).await
    }

    pub async fn firmware_version(&mut self) -> Result<String, HeadError> {
        self.transport.request(&Command::VersionSw).await
    }

    // --- calibration ---

    /// Current calibration frequency in Hz
    pub async fn frequency(&mut self) -> Result<u64, HeadError> {
        let payload = self.transport.request(&Command::Frequency).await?;
        let hz = decode_frequency("FREQUENCY?", &payload)?;
        self.mirror.frequency_hz = Some(hz);
        Ok(hz)
    }

    /// Set the calibration frequency
    ///
    /// Out-of-bounds values are refused before anything is sent, with the
    /// `ERROR 51`/`ERROR 52` kinds the head itself would report.
    pub async fn set_frequency(&mut self, hz: u64) -> Result<(), HeadError> {
        let (min_hz, max_hz) = self.frequency_bounds();
        let command = Command::SetFrequency { hz };
        let refused = if hz < min_hz {
            Some(DeviceErrorKind::ArgumentTooLow)
        } else if hz > max_hz {
            Some(DeviceErrorKind::ArgumentTooHigh)
        } else {
            None
        };
        if let Some(kind) = refused {
            return Err(DeviceError::refusal(kind, command.to_line()).into());
        }
        self.transport.request(&command).await?;
        self.mirror.frequency_hz = Some(hz);
        debug!("{}: frequency {} Hz", self.port(), hz);
        Ok(())
    }

    /// Calibrated frequency range in Hz, inclusive
    pub fn frequency_bounds(&self) -> (u64, u64) {
        (self.identity.min_frequency_hz, self.identity.max_frequency_hz)
    }

    // --- measurement ---

    /// Head temperature in °C
    pub async fn temperature(&mut self) -> Result<f64, HeadError> {
        let payload = self.transport.request(&Command::Temperature).await?;
        let celsius = decode_temperature(&payload)?;
        self.mirror.temperature_c = Some(celsius);
        Ok(celsius)
    }

    /// Take one power reading
    pub async fn read_power(&mut self) -> Result<PowerReading, HeadError> {
        let payload = self.transport.request(&Command::Power).await?;
        let reading = decode_power(&payload)?;
        self.mirror.last_power = Some(reading);
        Ok(reading)
    }

    pub async fn power_unit(&mut self) -> Result<PowerUnit, HeadError> {
        let payload = self.transport.request(&Command::PowerUnit).await?;
        let unit = decode_power_unit(&payload)?;
        self.mirror.power_unit = Some(unit);
        Ok(unit)
    }

    // --- averaging and link settings ---

    pub async fn filter(&mut self) -> Result<FilterSetting, HeadError> {
        let payload = self.transport.request(&Command::Filter).await?;
        let setting = decode_filter(&payload)?;
        if setting != self.mirror.filter {
            self.mirror.last_power = None;
        }
        self.mirror.filter = setting;
        Ok(setting)
    }

    /// Change the averaging setting
    ///
    /// Forgets the last reading: AUTO needs one taken under the new setting.
    pub async fn set_filter(&mut self, setting: FilterSetting) -> Result<(), HeadError> {
        self.transport.request(&Command::SetFilter(setting)).await?;
        self.mirror.filter = setting;
        self.mirror.last_power = None;
        debug!("{}: filter {}", self.port(), setting);
        Ok(())
    }

    /// Acquisition speed in kS/s
    ///
    /// Heads with a single speed are not queried.
    pub async fn acq_speed(&mut self) -> Result<u16, HeadError> {
        let ksps = match self.family().fixed_acq_speed() {
            Some(ksps) => ksps,
            None => decode_acq_speed(&self.transport.request(&Command::AcqSpeed).await?)?,
        };
        self.mirror.acq_speed_ksps = ksps;
        Ok(ksps)
    }

    /// Change the acquisition speed; the family must offer it
    pub async fn set_acq_speed(&mut self, ksps: u16) -> Result<(), HeadError> {
        let family = self.family();
        family.check_acq_speed(ksps)?;
        if family.fixed_acq_speed().is_none() {
            self.transport.request(&Command::SetAcqSpeed(ksps)).await?;
        }
        self.mirror.acq_speed_ksps = ksps;
        debug!("{}: acquisition speed {} kS/s", self.port(), ksps);
        Ok(())
    }

    pub async fn vbw(&mut self) -> Result<VbwSetting, HeadError> {
        let payload = self.transport.request(&Command::Vbw).await?;
        let setting = decode_vbw(&payload)?;
        self.mirror.vbw = Some(setting);
        Ok(setting)
    }

    pub async fn set_vbw(&mut self, setting: VbwSetting) -> Result<(), HeadError> {
        self.transport.request(&Command::SetVbw(setting)).await?;
        self.mirror.vbw = Some(setting);
        debug!("{}: video bandwidth {}", self.port(), setting);
        Ok(())
    }

    /// Video bandwidth in effect per the mirror
    ///
    /// `None` if the setting is unknown, or AUTO at a speed it does not
    /// couple to.
    pub fn video_bandwidth(&self) -> Option<VbwCode> {
        self.mirror
            .vbw
            .and_then(|setting| setting.effective(self.mirror.acq_speed_ksps))
    }

    pub async fn baud(&mut self) -> Result<BaudCode, HeadError> {
        let payload = self.transport.request(&Command::Baud).await?;
        let baud = decode_baud(&payload)?;
        self.mirror.baud = baud;
        Ok(baud)
    }

    /// Change the head's bit rate and follow it on the host side
    pub async fn set_baud(&mut self, baud: BaudCode) -> Result<(), HeadError> {
        self.transport.request(&Command::SetBaud(baud)).await?;
        self.transport.set_line_rate(baud.bits_per_second())?;
        self.mirror.baud = baud;
        Ok(())
    }

    // --- averaging controller ---

    /// Samples averaged per reading under the mirrored setting
    ///
    /// AUTO needs a reading taken since the last filter change.
    pub fn resolve_sample_count(&self) -> Result<u32, HeadError> {
        Ok(radipower_protocol::resolve_sample_count(
            self.family(),
            self.mirror.filter,
            self.mirror.last_power.as_ref(),
        )?)
    }

    /// Expected duration of one `POWER?` exchange
    ///
    /// Without a usable reading AUTO is assumed to average the family ceiling.
    pub fn estimated_exchange_time(&self) -> Duration {
        let samples = self
            .resolve_sample_count()
            .unwrap_or_else(|_| self.family().ceiling());
        exchange_time(self.mirror.baud, self.mirror.acq_speed_ksps, samples)
    }

    /// Pick a filter code for `target` samples; no I/O
    pub fn select_averaging(
        &self,
        target: u32,
        policy: AveragingPolicy,
    ) -> Result<FilterCode, HeadError> {
        Ok(select_filter(self.family(), target, policy)?)
    }

    /// Pick a filter code for `target` samples and apply it
    pub async fn apply_averaging(
        &mut self,
        target: u32,
        policy: AveragingPolicy,
    ) -> Result<FilterCode, HeadError> {
        let code = self.select_averaging(target, policy)?;
        self.set_filter(FilterSetting::Fixed(code)).await?;
        info!(
            "{}: {} averages requested ({:?}), using filter {} ({} samples)",
            self.port(),
            target,
            policy,
            code,
            self.family().samples_for(code)
        );
        Ok(code)
    }

    /// Close the link
    pub async fn close(self) -> Result<(), HeadError> {
        debug!("{}: closing", self.transport.port());
        self.transport.shutdown().await
    }
}
