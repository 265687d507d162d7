//! Core domain types for the reef dosing tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Water parameters and their store column keys
//! - Measurements (a dated set of optional readings)
//! - Raw rows as they travel to and from a measurement store
//! - New entries typed in by the user

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Parameters
// ============================================================================

/// A tracked water parameter
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Alk,
    Ca,
    Mg,
    No3,
    Po4,
    Ph,
}

impl Parameter {
    /// All parameters in store column order
    pub const ALL: [Parameter; 6] = [
        Parameter::Alk,
        Parameter::Ca,
        Parameter::Mg,
        Parameter::No3,
        Parameter::Po4,
        Parameter::Ph,
    ];

    /// Column key used by the measurement store
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Alk => "alk",
            Parameter::Ca => "ca",
            Parameter::Mg => "mg",
            Parameter::No3 => "no3",
            Parameter::Po4 => "po4",
            Parameter::Ph => "ph",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Parameter::Alk => "Alk",
            Parameter::Ca => "Ca",
            Parameter::Mg => "Mg",
            Parameter::No3 => "NO3",
            Parameter::Po4 => "PO4",
            Parameter::Ph => "pH",
        }
    }

    /// Measurement unit
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Alk => "dKH",
            Parameter::Ph => "",
            _ => "ppm",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Parameter {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = s.trim().to_lowercase();
        Parameter::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| crate::Error::Validation(format!("Unknown parameter: {}", s)))
    }
}

// ============================================================================
// Measurements
// ============================================================================

/// One dated water test. Readings that were not taken are `None`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub date: NaiveDate,
    pub alk: Option<f64>,
    pub ca: Option<f64>,
    pub mg: Option<f64>,
    pub no3: Option<f64>,
    pub po4: Option<f64>,
    pub ph: Option<f64>,
}

impl Measurement {
    /// A measurement with no readings
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            alk: None,
            ca: None,
            mg: None,
            no3: None,
            po4: None,
            ph: None,
        }
    }

    /// Reading for a given parameter
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Alk => self.alk,
            Parameter::Ca => self.ca,
            Parameter::Mg => self.mg,
            Parameter::No3 => self.no3,
            Parameter::Po4 => self.po4,
            Parameter::Ph => self.ph,
        }
    }

    fn slot(&mut self, parameter: Parameter) -> &mut Option<f64> {
        match parameter {
            Parameter::Alk => &mut self.alk,
            Parameter::Ca => &mut self.ca,
            Parameter::Mg => &mut self.mg,
            Parameter::No3 => &mut self.no3,
            Parameter::Po4 => &mut self.po4,
            Parameter::Ph => &mut self.ph,
        }
    }

    /// Builder-style setter, mostly useful for fixtures
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        *self.slot(parameter) = Some(value);
        self
    }

    pub(crate) fn set(&mut self, parameter: Parameter, value: Option<f64>) {
        *self.slot(parameter) = value;
    }
}

// ============================================================================
// Store rows
// ============================================================================

/// A row as exchanged with a measurement store.
///
/// The spreadsheet backend hands back loosely typed cells: dates may be plain
/// dates or full timestamps, and readings may be numbers, numeric strings or
/// blanks. Fields are kept as raw JSON values until ingestion coerces them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alk: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mg: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no3: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po4: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<Value>,
}

impl RawRecord {
    /// Raw cell for a given parameter
    pub fn field(&self, parameter: Parameter) -> Option<&Value> {
        match parameter {
            Parameter::Alk => self.alk.as_ref(),
            Parameter::Ca => self.ca.as_ref(),
            Parameter::Mg => self.mg.as_ref(),
            Parameter::No3 => self.no3.as_ref(),
            Parameter::Po4 => self.po4.as_ref(),
            Parameter::Ph => self.ph.as_ref(),
        }
    }
}

// ============================================================================
// User entries
// ============================================================================

/// A measurement typed in by the user, still as raw text.
#[derive(Clone, Debug, Default)]
pub struct NewEntry {
    pub date: String,
    pub alk: Option<String>,
    pub ca: Option<String>,
    pub mg: Option<String>,
    pub no3: Option<String>,
    pub po4: Option<String>,
    pub ph: Option<String>,
}

impl NewEntry {
    fn text(&self, parameter: Parameter) -> Option<&str> {
        let value = match parameter {
            Parameter::Alk => &self.alk,
            Parameter::Ca => &self.ca,
            Parameter::Mg => &self.mg,
            Parameter::No3 => &self.no3,
            Parameter::Po4 => &self.po4,
            Parameter::Ph => &self.ph,
        };
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Check the entry and convert it into a measurement.
    ///
    /// Date and alkalinity are required; every other reading is optional.
    pub fn validate(&self) -> crate::Result<Measurement> {
        let date = crate::ingest::parse_date(&self.date)
            .ok_or_else(|| crate::Error::Validation("Date is required".into()))?;

        if self.text(Parameter::Alk).is_none() {
            return Err(crate::Error::Validation("Alkalinity is required".into()));
        }

        let mut measurement = Measurement::empty(date);
        for parameter in Parameter::ALL {
            let value = self.text(parameter).and_then(crate::ingest::parse_float_prefix);
            measurement.set(parameter, value);
        }
        Ok(measurement)
    }

    /// Row to send to a store. Cells are posted as the text the user typed.
    pub fn to_record(&self) -> RawRecord {
        let cell = |p: Parameter| self.text(p).map(|s| Value::String(s.to_string()));
        RawRecord {
            date: Some(Value::String(self.date.trim().to_string())),
            alk: cell(Parameter::Alk),
            ca: cell(Parameter::Ca),
            mg: cell(Parameter::Mg),
            no3: cell(Parameter::No3),
            po4: cell(Parameter::Po4),
            ph: cell(Parameter::Ph),
        }
    }
}
