//! Dosing estimator for a four-part calcium/alkalinity reagent system.
//!
//! The plan has two components:
//! - **Maintenance**: Part 1 volume that offsets the calcium consumption
//!   observed between the two most recent calcium readings
//! - **Correction**: extra Part 1 volume that closes the gap between the
//!   current and target calcium, spread over several days when large
//!
//! Parts 2-4 follow the maintenance dose only.

use crate::config::{DosingConfig, TankConfig};
use crate::{Measurement, MeasurementLog};
use serde::Serialize;

/// Liters per US gallon
pub const LITERS_PER_GALLON: f64 = 3.78541;

/// Parameters of the dosing calculation
#[derive(Clone, Debug, PartialEq)]
pub struct DosingParams {
    /// ppm of calcium raised per mL of Part 1 in this system
    pub impact_factor: f64,
    pub part2_ratio: f64,
    pub part3_ratio: f64,
    pub part4_ratio: f64,
    /// Gaps at or below this (ppm) need no correction
    pub correction_threshold: f64,
    /// Gaps above this (ppm) are corrected over `split_days`
    pub split_threshold: f64,
    pub split_days: u32,
}

impl DosingParams {
    /// Scale the per-100-liter impact constant to the tank volume
    pub fn impact_factor_for(volume_liters: f64, impact_per_100l: f64) -> f64 {
        impact_per_100l * (100.0 / volume_liters)
    }

    pub fn from_config(tank: &TankConfig, dosing: &DosingConfig) -> Self {
        let volume_liters = tank.volume_gallons * LITERS_PER_GALLON;
        Self {
            impact_factor: Self::impact_factor_for(volume_liters, tank.ca_impact_per_100l),
            part2_ratio: dosing.part2_ratio,
            part3_ratio: dosing.part3_ratio,
            part4_ratio: dosing.part4_ratio,
            correction_threshold: dosing.correction_threshold,
            split_threshold: dosing.split_threshold,
            split_days: dosing.split_days,
        }
    }

    /// Same ratios and thresholds with a different impact factor
    pub fn with_impact_factor(mut self, impact_factor: f64) -> Self {
        self.impact_factor = impact_factor;
        self
    }
}

impl Default for DosingParams {
    fn default() -> Self {
        Self::from_config(&TankConfig::default(), &DosingConfig::default())
    }
}

/// Why a dose request was rejected
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DoseInputError {
    #[error("Enter a numeric current calcium value")]
    MissingCurrent,

    #[error("Enter a numeric target calcium value")]
    MissingTarget,

    #[error("Calcium values must be finite and greater than zero (got {0})")]
    NotPositive(f64),
}

impl From<DoseInputError> for crate::Error {
    fn from(e: DoseInputError) -> Self {
        crate::Error::Validation(e.to_string())
    }
}

/// Validated current/target calcium pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoseRequest {
    pub current_ca: f64,
    pub target_ca: f64,
}

impl DoseRequest {
    pub fn new(current_ca: f64, target_ca: f64) -> std::result::Result<Self, DoseInputError> {
        for value in [current_ca, target_ca] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DoseInputError::NotPositive(value));
            }
        }
        Ok(Self {
            current_ca,
            target_ca,
        })
    }

    /// Validate raw user text for both fields
    pub fn parse(
        current: Option<&str>,
        target: Option<&str>,
    ) -> std::result::Result<Self, DoseInputError> {
        let current_ca = current
            .and_then(crate::ingest::parse_float_prefix)
            .ok_or(DoseInputError::MissingCurrent)?;
        let target_ca = target
            .and_then(crate::ingest::parse_float_prefix)
            .ok_or(DoseInputError::MissingTarget)?;
        Self::new(current_ca, target_ca)
    }
}

/// Recommended daily doses
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DosingPlan {
    /// Observed calcium drop, ppm/day
    pub consumption_ppm_per_day: f64,
    /// Part 1 volume offsetting consumption, mL
    pub maintenance_ml: f64,
    /// Extra Part 1 volume to dose today, mL
    pub correction_today_ml: f64,
    /// Whether the target gap called for a correction
    pub correction_applied: bool,
    /// Days the full correction is spread over (0 when none)
    pub correction_days: u32,
    pub part1_ml: f64,
    pub part2_ml: f64,
    pub part3_ml: f64,
    pub part4_ml: f64,
}

impl DosingPlan {
    /// Copy of the plan with every figure rounded to one decimal place
    pub fn rounded(&self) -> Self {
        Self {
            consumption_ppm_per_day: round1(self.consumption_ppm_per_day),
            maintenance_ml: round1(self.maintenance_ml),
            correction_today_ml: round1(self.correction_today_ml),
            part1_ml: round1(self.part1_ml),
            part2_ml: round1(self.part2_ml),
            part3_ml: round1(self.part3_ml),
            part4_ml: round1(self.part4_ml),
            ..self.clone()
        }
    }

    /// Part volumes in order, for display
    pub fn parts(&self) -> [(&'static str, f64); 4] {
        [
            ("Part 1 (Ca)", self.part1_ml),
            ("Part 2 (Alk)", self.part2_ml),
            ("Part 3 (Iodine)", self.part3_ml),
            ("Part 4 (Bio)", self.part4_ml),
        ]
    }

    /// True when current calcium is close enough to target
    pub fn levels_match(&self) -> bool {
        !self.correction_applied
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Daily calcium consumption from the two most recent calcium readings.
///
/// Returns 0 when fewer than two readings exist or calcium rose.
pub fn consumption_rate(log: &MeasurementLog) -> f64 {
    let mut recent = log.with_calcium().rev();
    let (newer, older) = match (recent.next(), recent.next()) {
        (Some(newer), Some(older)) => (newer, older),
        _ => return 0.0,
    };
    rate_between(older, newer)
}

fn rate_between(older: &Measurement, newer: &Measurement) -> f64 {
    let (Some(older_ca), Some(newer_ca)) = (older.ca, newer.ca) else {
        return 0.0;
    };
    let days = (newer.date - older.date).num_days().abs().max(1);
    let drop = (older_ca - newer_ca).max(0.0);
    drop / days as f64
}

/// Compute today's dosing plan. Reads the log, never modifies it.
pub fn estimate(request: &DoseRequest, log: &MeasurementLog, params: &DosingParams) -> DosingPlan {
    let consumption = consumption_rate(log);
    let maintenance = consumption / params.impact_factor;

    let gap = request.target_ca - request.current_ca;
    let (correction_today, correction_days) = if gap > params.correction_threshold {
        let total = gap / params.impact_factor;
        if gap > params.split_threshold {
            let days = params.split_days.max(1);
            (total / days as f64, days)
        } else {
            (total, 1)
        }
    } else {
        (0.0, 0)
    };

    tracing::debug!(
        consumption,
        maintenance,
        gap,
        correction_today,
        "Estimated dosing plan"
    );

    DosingPlan {
        consumption_ppm_per_day: consumption,
        maintenance_ml: maintenance,
        correction_today_ml: correction_today,
        correction_applied: correction_days > 0,
        correction_days,
        part1_ml: maintenance + correction_today,
        part2_ml: maintenance * params.part2_ratio,
        part3_ml: maintenance * params.part3_ratio,
        part4_ml: maintenance * params.part4_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Parameter;
    use chrono::NaiveDate;

    const EPS: f64 = 1e-9;

    fn unit_params() -> DosingParams {
        DosingParams::default().with_impact_factor(1.0)
    }

    fn ca(y: i32, m: u32, d: u32, value: f64) -> Measurement {
        Measurement::empty(NaiveDate::from_ymd_opt(y, m, d).unwrap()).with(Parameter::Ca, value)
    }

    fn two_reading_log() -> MeasurementLog {
        MeasurementLog::from_measurements(vec![ca(2024, 1, 1, 440.0), ca(2024, 1, 11, 420.0)])
    }

    fn request(current: f64, target: f64) -> DoseRequest {
        DoseRequest::new(current, target).unwrap()
    }

    #[test]
    fn test_default_impact_factor() {
        let params = DosingParams::default();
        let liters = 35.0 * LITERS_PER_GALLON;
        assert!((params.impact_factor - 1.4 * 100.0 / liters).abs() < EPS);
    }

    #[test]
    fn test_fewer_than_two_readings_means_no_consumption() {
        let empty = MeasurementLog::new();
        let single = MeasurementLog::from_measurements(vec![
            ca(2024, 1, 1, 440.0),
            Measurement::empty(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
                .with(Parameter::Alk, 8.0),
        ]);

        for log in [&empty, &single] {
            for req in [request(400.0, 430.0), request(420.0, 420.0), request(450.0, 410.0)] {
                let plan = estimate(&req, log, &unit_params());
                assert_eq!(plan.consumption_ppm_per_day, 0.0);
                assert_eq!(plan.maintenance_ml, 0.0);
                assert_eq!(plan.part2_ml, 0.0);
            }
        }
    }

    #[test]
    fn test_consumption_over_ten_days() {
        let plan = estimate(&request(420.0, 420.0), &two_reading_log(), &unit_params());
        assert!((plan.consumption_ppm_per_day - 2.0).abs() < EPS);
        assert!((plan.maintenance_ml - 2.0).abs() < EPS);
        assert!((plan.part1_ml - 2.0).abs() < EPS);
    }

    #[test]
    fn test_only_last_two_calcium_readings_count() {
        let mut log = two_reading_log();
        log.append(
            Measurement::empty(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap())
                .with(Parameter::Alk, 8.2),
        );
        log.append(ca(2023, 12, 1, 500.0));

        let plan = estimate(&request(420.0, 420.0), &log, &unit_params());
        assert!((plan.consumption_ppm_per_day - 2.0).abs() < EPS);
    }

    #[test]
    fn test_same_day_readings_use_one_day() {
        let log = MeasurementLog::from_measurements(vec![
            ca(2024, 1, 1, 440.0),
            ca(2024, 1, 1, 434.0),
        ]);
        assert!((consumption_rate(&log) - 6.0).abs() < EPS);
    }

    #[test]
    fn test_rising_calcium_clamps_to_zero() {
        let log = MeasurementLog::from_measurements(vec![
            ca(2024, 1, 1, 400.0),
            ca(2024, 1, 4, 430.0),
        ]);
        let plan = estimate(&request(430.0, 430.0), &log, &unit_params());
        assert_eq!(plan.consumption_ppm_per_day, 0.0);
        assert_eq!(plan.maintenance_ml, 0.0);
    }

    #[test]
    fn test_large_gap_is_split_over_three_days() {
        let params = DosingParams::default();
        let plan = estimate(&request(400.0, 430.0), &MeasurementLog::new(), &params);

        let expected = (30.0 / params.impact_factor) / 3.0;
        assert!((plan.correction_today_ml - expected).abs() < EPS);
        assert!(plan.correction_applied);
        assert_eq!(plan.correction_days, 3);
        assert!((plan.part1_ml - expected).abs() < EPS);
    }

    #[test]
    fn test_medium_gap_is_corrected_today() {
        let plan = estimate(&request(410.0, 420.0), &MeasurementLog::new(), &unit_params());
        assert!((plan.correction_today_ml - 10.0).abs() < EPS);
        assert_eq!(plan.correction_days, 1);
    }

    #[test]
    fn test_small_gap_levels_match() {
        let plan = estimate(&request(420.0, 422.0), &two_reading_log(), &unit_params());
        assert_eq!(plan.correction_today_ml, 0.0);
        assert!(!plan.correction_applied);
        assert!(plan.levels_match());

        // Threshold is exclusive
        let at_threshold = estimate(&request(420.0, 425.0), &two_reading_log(), &unit_params());
        assert!(at_threshold.levels_match());

        // Calcium above target never produces a negative correction
        let above = estimate(&request(450.0, 420.0), &two_reading_log(), &unit_params());
        assert_eq!(above.correction_today_ml, 0.0);
    }

    #[test]
    fn test_split_threshold_is_exclusive() {
        let at_split = estimate(&request(400.0, 420.0), &MeasurementLog::new(), &unit_params());
        assert!(at_split.correction_applied);
        assert_eq!(at_split.correction_days, 1);
        assert!((at_split.correction_today_ml - 20.0).abs() < EPS);

        let past_split = estimate(&request(400.0, 421.0), &MeasurementLog::new(), &unit_params());
        assert_eq!(past_split.correction_days, 3);
        assert!((past_split.correction_today_ml - 7.0).abs() < EPS);
    }

    #[test]
    fn test_parts_follow_maintenance_only() {
        for (current, target) in [(420.0, 420.0), (415.0, 425.0), (380.0, 440.0)] {
            let plan = estimate(&request(current, target), &two_reading_log(), &unit_params());
            assert!((plan.part2_ml - plan.maintenance_ml * 2.0).abs() < EPS);
            assert!((plan.part3_ml - plan.maintenance_ml * 0.5).abs() < EPS);
            assert!((plan.part4_ml - plan.maintenance_ml * 0.5).abs() < EPS);
            assert!((plan.part1_ml - plan.maintenance_ml - plan.correction_today_ml).abs() < EPS);
        }
    }

    #[test]
    fn test_rounded_plan() {
        let params = DosingParams::default();
        let plan = estimate(&request(400.0, 430.0), &two_reading_log(), &params).rounded();
        assert_eq!(plan.consumption_ppm_per_day, 2.0);
        assert_eq!(plan.part1_ml, (plan.part1_ml * 10.0).round() / 10.0);
    }

    #[test]
    fn test_estimate_does_not_modify_log() {
        let log = two_reading_log();
        let before = log.clone();
        let _ = estimate(&request(400.0, 430.0), &log, &unit_params());
        assert_eq!(log, before);
    }

    #[test]
    fn test_dose_request_parse() {
        assert_eq!(
            DoseRequest::parse(Some("420"), Some("440 ppm")).unwrap(),
            DoseRequest {
                current_ca: 420.0,
                target_ca: 440.0
            }
        );
        assert_eq!(
            DoseRequest::parse(None, Some("440")),
            Err(DoseInputError::MissingCurrent)
        );
        assert_eq!(
            DoseRequest::parse(Some("420"), Some("lots")),
            Err(DoseInputError::MissingTarget)
        );
        assert_eq!(
            DoseRequest::parse(Some("0"), Some("440")),
            Err(DoseInputError::NotPositive(0.0))
        );
        assert_eq!(
            DoseRequest::new(400.0, f64::INFINITY),
            Err(DoseInputError::NotPositive(f64::INFINITY))
        );
        assert!(DoseRequest::new(f64::NEG_INFINITY, 420.0).is_err());
        assert!(DoseRequest::parse(Some("420"), Some("Infinity")).is_err());
    }
}
