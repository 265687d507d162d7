//! The measurement log: an append-only series ordered ascending by date.

use crate::{Measurement, Parameter, RawRecord};
use chrono::NaiveDate;

/// Ordered collection of measurements.
///
/// Entries are never modified once added. Ordering is ascending by date with
/// insertion order preserved among equal dates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeasurementLog {
    entries: Vec<Measurement>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from store rows (coerced, filtered and sorted)
    pub fn from_records(records: &[RawRecord]) -> Self {
        Self {
            entries: crate::ingest::ingest_records(records),
        }
    }

    /// Build a log from measurements in any order
    pub fn from_measurements(mut entries: Vec<Measurement>) -> Self {
        entries.sort_by_key(|m| m.date);
        Self { entries }
    }

    /// Add a measurement, keeping the log sorted.
    ///
    /// A back-dated entry lands after any existing entries with the same date.
    pub fn append(&mut self, measurement: Measurement) {
        let idx = self.entries.partition_point(|m| m.date <= measurement.date);
        self.entries.insert(idx, measurement);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Measurement> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.entries
    }

    /// Most recent measurement
    pub fn latest(&self) -> Option<&Measurement> {
        self.entries.last()
    }

    /// Most recent value recorded for a parameter, with its date
    pub fn latest_value(&self, parameter: Parameter) -> Option<(NaiveDate, f64)> {
        self.entries
            .iter()
            .rev()
            .find_map(|m| m.get(parameter).map(|v| (m.date, v)))
    }

    /// Entries carrying a calcium reading, oldest first
    pub fn with_calcium(&self) -> impl DoubleEndedIterator<Item = &Measurement> {
        self.entries.iter().filter(|m| m.ca.is_some())
    }

    /// Dated values for one parameter, skipping entries without a reading
    pub fn series(&self, parameter: Parameter) -> Vec<(NaiveDate, f64)> {
        self.entries
            .iter()
            .filter_map(|m| m.get(parameter).map(|v| (m.date, v)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a MeasurementLog {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
