//! Status classification against per-parameter target ranges.

use crate::Parameter;
use serde::{Deserialize, Serialize};

/// Inclusive target range for one parameter
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Tolerance band on either side of the range: half its width
    pub fn warn_band(&self) -> f64 {
        (self.max - self.min) * 0.5
    }
}

/// How a reading compares to its target range
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Good,
    Warn,
    Bad,
    Unknown,
}

impl Status {
    /// Short marker for terminal output
    pub fn marker(self) -> &'static str {
        match self {
            Status::Good => "✓",
            Status::Warn => "!",
            Status::Bad => "✗",
            Status::Unknown => "?",
        }
    }
}

/// Target ranges for every tracked parameter
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ranges {
    pub alk: Range,
    pub ca: Range,
    pub mg: Range,
    pub no3: Range,
    pub po4: Range,
    pub ph: Range,
}

impl Default for Ranges {
    fn default() -> Self {
        Self {
            alk: Range::new(8.0, 10.0),
            ca: Range::new(400.0, 460.0),
            mg: Range::new(1250.0, 1450.0),
            no3: Range::new(1.0, 15.0),
            po4: Range::new(0.02, 0.1),
            ph: Range::new(8.0, 8.4),
        }
    }
}

impl Ranges {
    pub fn get(&self, parameter: Parameter) -> Range {
        match parameter {
            Parameter::Alk => self.alk,
            Parameter::Ca => self.ca,
            Parameter::Mg => self.mg,
            Parameter::No3 => self.no3,
            Parameter::Po4 => self.po4,
            Parameter::Ph => self.ph,
        }
    }
}

/// Classify a reading: inside the range is good, within half the range width
/// outside it is a warning, anything further is bad.
pub fn classify(ranges: &Ranges, parameter: Parameter, value: Option<f64>) -> Status {
    let Some(v) = value else {
        return Status::Unknown;
    };
    let range = ranges.get(parameter);
    if v >= range.min && v <= range.max {
        return Status::Good;
    }
    let band = range.warn_band();
    if v >= range.min - band && v <= range.max + band {
        Status::Warn
    } else {
        Status::Bad
    }
}
