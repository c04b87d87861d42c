//! Radipower model families
//!
//! Heads are grouped by model series. A series fixes the averaging ladder,
//! the acquisition speeds and the usable power range. The family is chosen
//! once, from the model token in the `*IDN?` reply, and then carried as
//! data so no other code has to look at model names.

use std::fmt;

use crate::averaging::FilterCode;
use crate::error::ProtocolError;

/// Every Radipower model token starts with this prefix
pub const MODEL_PREFIX: &str = "RPR";

/// Length of a model token such as `RPR2006C`
pub const MODEL_TOKEN_LEN: usize = 8;

/// Length of the series part of a model token, e.g. `RPR2006`
pub const MODEL_SERIES_LEN: usize = 7;

/// Static description of a model family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilyTraits {
    /// Model series, e.g. `RPR2006`
    pub series: &'static str,
    /// Samples averaged per reading for filter codes 1..=7
    pub averages: [u32; 7],
    /// Acquisition speeds in kS/s the family accepts
    pub acq_speeds_ksps: &'static [u16],
    /// Lowest usable input power in dBm
    pub min_power_dbm: f64,
    /// Highest usable input power in dBm
    pub max_power_dbm: f64,
}

/// ×3.16 per step
const SHORT_LADDER: [u32; 7] = [1, 3, 10, 30, 100, 300, 1000];

/// ×10 per two steps, capped at 5000
const LONG_LADDER: [u32; 7] = [10, 30, 100, 300, 1000, 3000, 5000];

const RPR1006_TRAITS: FamilyTraits = FamilyTraits {
    series: "RPR1006",
    averages: SHORT_LADDER,
    acq_speeds_ksps: &[10, 100, 1000],
    min_power_dbm: -55.0,
    max_power_dbm: 10.0,
};

const RPR1018_TRAITS: FamilyTraits = FamilyTraits {
    series: "RPR1018",
    averages: SHORT_LADDER,
    acq_speeds_ksps: &[1000],
    min_power_dbm: -55.0,
    max_power_dbm: 10.0,
};

const RPR2006_TRAITS: FamilyTraits = FamilyTraits {
    series: "RPR2006",
    averages: LONG_LADDER,
    acq_speeds_ksps: &[20, 100, 1000],
    min_power_dbm: -55.0,
    max_power_dbm: 10.0,
};

/// Closed set of head families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelFamily {
    /// RPR1006 heads: short ladder, 10/100/1000 kS/s
    Rpr1006,
    /// RPR1018 heads: short ladder, fixed 1000 kS/s
    Rpr1018,
    /// RPR2006 heads: long ladder, 20/100/1000 kS/s
    Rpr2006,
}

impl ModelFamily {
    /// All known families
    pub const ALL: [ModelFamily; 3] = [Self::Rpr1006, Self::Rpr1018, Self::Rpr2006];

    /// Pick the family for a model token
    pub fn from_model(model: &str) -> Result<Self, ProtocolError> {
        if model.len() != MODEL_TOKEN_LEN || !model.starts_with(MODEL_PREFIX) {
            return Err(ProtocolError::UnknownModel(model.to_string()));
        }
        let series = &model[..MODEL_SERIES_LEN];
        Self::ALL
            .into_iter()
            .find(|f| f.traits().series == series)
            .ok_or_else(|| ProtocolError::UnknownModel(model.to_string()))
    }

    /// Static data for this family
    pub fn traits(&self) -> &'static FamilyTraits {
        match self {
            Self::Rpr1006 => &RPR1006_TRAITS,
            Self::Rpr1018 => &RPR1018_TRAITS,
            Self::Rpr2006 => &RPR2006_TRAITS,
        }
    }

    /// Model series name
    pub fn name(&self) -> &'static str {
        self.traits().series
    }

    /// Averaging ladder indexed by `code - 1`
    pub fn averages(&self) -> &'static [u32; 7] {
        &self.traits().averages
    }

    /// Samples averaged for a fixed filter code
    pub fn samples_for(&self, code: FilterCode) -> u32 {
        self.averages()[code.index()]
    }

    /// Largest number of samples one reading can average
    pub fn ceiling(&self) -> u32 {
        self.averages()[6]
    }

    /// Acquisition speeds in kS/s
    pub fn acq_speeds(&self) -> &'static [u16] {
        self.traits().acq_speeds_ksps
    }

    /// The only acquisition speed of a single-speed family
    ///
    /// Such heads refuse `ACQ_SPEED` commands altogether.
    pub fn fixed_acq_speed(&self) -> Option<u16> {
        match self.acq_speeds() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Check an acquisition speed against the family
    pub fn check_acq_speed(&self, ksps: u16) -> Result<(), ProtocolError> {
        if self.acq_speeds().contains(&ksps) {
            Ok(())
        } else {
            Err(ProtocolError::UnsupportedAcqSpeed {
                requested: ksps,
                family: self.name(),
            })
        }
    }

    /// Usable input power range in dBm
    pub fn power_range_dbm(&self) -> (f64, f64) {
        let t = self.traits();
        (t.min_power_dbm, t.max_power_dbm)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Find the model token inside an `*IDN?` reply
///
/// The reply is free text from the vendor; the token is the eight
/// characters starting at the first occurrence of [`MODEL_PREFIX`].
pub fn model_token(idn: &str) -> Option<&str> {
    let start = idn.find(MODEL_PREFIX)?;
    let token = idn.get(start..start + MODEL_TOKEN_LEN)?;
    token
        .chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then_some(token)
}
