//! Averaging control
//!
//! A head averages a number of raw samples into each reported reading. The
//! number is selected by a filter code `1..=7`, looked up in the family's
//! ladder, or by `AUTO`, where the code follows the signal level:
//!
//! | power (dBm)   | code |
//! |---------------|------|
//! | `(-inf, -50]` | 7    |
//! | `(-50, -40]`  | 6    |
//! | `(-40, -30]`  | 5    |
//! | `(-30, -20]`  | 4    |
//! | `(-20, +inf)` | 3    |
//!
//! Bands are closed at the top and open at the bottom, so -40.0 dBm lands in
//! the code 6 band.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::models::ModelFamily;
use crate::response::{PowerReading, PowerUnit};

/// Validated filter code in `1..=7`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct FilterCode(u8);

impl FilterCode {
    /// Least averaging
    pub const MIN: FilterCode = FilterCode(1);
    /// Most averaging
    pub const MAX: FilterCode = FilterCode(7);

    /// Create a filter code, rejecting values outside `1..=7`
    pub fn new(code: u8) -> Result<Self, ProtocolError> {
        if (1..=7).contains(&code) {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidFilterCode(code.to_string()))
        }
    }

    /// Numeric value
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based ladder index
    pub(crate) fn index(&self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Codes 1 through 7 in order
    pub fn all() -> impl Iterator<Item = FilterCode> {
        (1..=7).map(FilterCode)
    }
}

impl TryFrom<u8> for FilterCode {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<FilterCode> for u8 {
    fn from(code: FilterCode) -> Self {
        code.0
    }
}

impl fmt::Display for FilterCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Averaging state of a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterSetting {
    /// Fixed number of samples from the family ladder
    Fixed(FilterCode),
    /// Code follows the measured power level
    Auto,
}

impl fmt::Display for FilterSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(code) => write!(f, "{code}"),
            Self::Auto => f.write_str("AUTO"),
        }
    }
}

impl FromStr for FilterSetting {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "AUTO" {
            return Ok(Self::Auto);
        }
        let code = s
            .parse::<u8>()
            .map_err(|_| ProtocolError::InvalidFilterCode(s.to_string()))?;
        FilterCode::new(code).map(Self::Fixed)
    }
}

impl From<FilterCode> for FilterSetting {
    fn from(code: FilterCode) -> Self {
        Self::Fixed(code)
    }
}

/// Upper edge (inclusive) of each AUTO band and its code, lowest power first
const AUTO_BANDS: [(f64, u8); 4] = [(-50.0, 7), (-40.0, 6), (-30.0, 5), (-20.0, 4)];

/// Code used above the highest AUTO band edge
const AUTO_TOP_CODE: u8 = 3;

/// Filter code AUTO selects for a power level in dBm
pub fn auto_filter_code(dbm: f64) -> FilterCode {
    let code = AUTO_BANDS
        .iter()
        .find(|(upper, _)| dbm <= *upper)
        .map(|(_, code)| *code)
        .unwrap_or(AUTO_TOP_CODE);
    FilterCode(code)
}

/// Number of samples averaged per reading
///
/// For AUTO the reading must be in dBm; it is the caller's job to make sure
/// it was taken under the current setting.
pub fn resolve_sample_count(
    family: ModelFamily,
    setting: FilterSetting,
    reading: Option<&PowerReading>,
) -> Result<u32, ProtocolError> {
    match setting {
        FilterSetting::Fixed(code) => Ok(family.samples_for(code)),
        FilterSetting::Auto => match reading {
            Some(r) if r.unit == PowerUnit::Dbm => {
                Ok(family.samples_for(auto_filter_code(r.value)))
            }
            _ => Err(ProtocolError::AutoNeedsReading),
        },
    }
}

/// Adjacent filter codes whose sample counts bracket `target`
///
/// An exact ladder value gives `(code, code)`. Below the first rung the
/// lower side is `None`, above the last rung the upper side is `None`.
pub fn filter_bounds(family: ModelFamily, target: u32) -> (Option<FilterCode>, Option<FilterCode>) {
    let ladder = family.averages();
    let mut lower = None;
    for code in FilterCode::all() {
        let samples = ladder[code.index()];
        if samples == target {
            return (Some(code), Some(code));
        }
        if samples > target {
            return (lower, Some(code));
        }
        lower = Some(code);
    }
    (lower, None)
}

/// How to pick a filter code for a target number of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AveragingPolicy {
    /// Never average more than the target ("no smear")
    NoSmear,
    /// Average at least the target to minimize RMS noise
    MinRmsNoise,
    /// Ladder value numerically nearest the target
    #[default]
    Closest,
    /// Always the longest average
    Most,
}

impl FromStr for AveragingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "no-smear" | "nosmear" => Ok(Self::NoSmear),
            "min-rms" | "minrms" => Ok(Self::MinRmsNoise),
            "closest" => Ok(Self::Closest),
            "most" => Ok(Self::Most),
            other => Err(format!("unknown averaging policy: {other}")),
        }
    }
}

/// Choose a filter code for `target` samples per reading
pub fn select_filter(
    family: ModelFamily,
    target: u32,
    policy: AveragingPolicy,
) -> Result<FilterCode, ProtocolError> {
    if policy == AveragingPolicy::Most {
        return Ok(FilterCode::MAX);
    }

    let ceiling = family.ceiling();
    if target > ceiling {
        return Err(ProtocolError::AveragesAboveCeiling {
            requested: target,
            ceiling,
        });
    }

    // target <= ceiling, so the upper side is always present
    let (lower, upper) = filter_bounds(family, target);
    let upper = upper.unwrap_or(FilterCode::MAX);
    let code = match (policy, lower) {
        (_, None) => upper,
        (AveragingPolicy::NoSmear, Some(lower)) => lower,
        (AveragingPolicy::MinRmsNoise, Some(_)) => upper,
        (AveragingPolicy::Closest, Some(lower)) => {
            let below = target - family.samples_for(lower);
            let above = family.samples_for(upper) - target;
            if above < below {
                upper
            } else {
                lower
            }
        }
        (AveragingPolicy::Most, Some(_)) => FilterCode::MAX,
    };
    Ok(code)
}
