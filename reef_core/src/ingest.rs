//! Record ingestion: turning loosely typed store rows into measurements.
//!
//! Readings that are missing or not numeric become `None`, never 0.
//! Rows without a usable date are dropped.

use crate::{Measurement, Parameter, RawRecord};
use chrono::NaiveDate;
use serde_json::Value;

/// Date formats accepted after any time component has been stripped
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Parse the longest leading decimal number in `text`.
///
/// Leading whitespace is skipped and trailing garbage ignored, so
/// `"8.3 dKH"` yields 8.3. Returns `None` when no digits lead the string or
/// the value is not finite.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Coerce a raw cell into a reading
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

/// Parse a calendar date, ignoring any time component after a `T`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.trim().split('T').next()?.trim();
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Coerce a raw date cell
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

impl TryFrom<&RawRecord> for Measurement {
    type Error = crate::Error;

    fn try_from(record: &RawRecord) -> crate::Result<Self> {
        let date = record
            .date
            .as_ref()
            .and_then(coerce_date)
            .ok_or_else(|| crate::Error::Other(format!("Row has no valid date: {:?}", record.date)))?;

        let mut measurement = Measurement::empty(date);
        for parameter in Parameter::ALL {
            measurement.set(parameter, record.field(parameter).and_then(coerce_number));
        }
        Ok(measurement)
    }
}

/// Convert store rows into measurements sorted ascending by date.
///
/// Rows without a valid date are skipped. Rows sharing a date keep their
/// original relative order.
pub fn ingest_records(records: &[RawRecord]) -> Vec<Measurement> {
    let mut measurements = Vec::with_capacity(records.len());
    for record in records {
        match Measurement::try_from(record) {
            Ok(m) => measurements.push(m),
            Err(e) => tracing::debug!("Skipping row: {}", e),
        }
    }

    let skipped = records.len() - measurements.len();
    if skipped > 0 {
        tracing::warn!("Dropped {} rows without a valid date", skipped);
    }

    measurements.sort_by_key(|m| m.date);
    measurements
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("420"), Some(420.0));
        assert_eq!(parse_float_prefix("  8.3 dKH"), Some(8.3));
        assert_eq!(parse_float_prefix(".05"), Some(0.05));
        assert_eq!(parse_float_prefix("-1.5e2x"), Some(-150.0));
        assert_eq!(parse_float_prefix("7e"), Some(7.0));
        assert_eq!(parse_float_prefix("0"), Some(0.0));
    }

    #[test]
    fn test_parse_float_prefix_rejects_garbage() {
        assert_eq!(parse_float_prefix(""), None);
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("1e999"), None);
    }

    #[test]
    fn test_coerce_number_never_defaults_to_zero() {
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!("")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!([1])), None);
        assert_eq!(coerce_number(&json!(1350)), Some(1350.0));
        assert_eq!(coerce_number(&json!("0.03")), Some(0.03));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("2024-03-09"), Some(expected));
        assert_eq!(parse_date("2024-03-09T08:00:00.000Z"), Some(expected));
        assert_eq!(parse_date("03/09/2024"), Some(expected));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("-"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_ingest_filters_and_sorts() {
        let records: Vec<RawRecord> = serde_json::from_value(json!([
            {"date": "2024-03-10", "ca": "425"},
            {"date": "", "ca": "999"},
            {"ca": "998"},
            {"date": 12345, "ca": "997"},
            {"date": "2024-03-01T00:00:00.000Z", "ca": 440, "alk": "8.1"},
        ]))
        .unwrap();

        let log = ingest_records(&records);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(log[0].ca, Some(440.0));
        assert_eq!(log[0].alk, Some(8.1));
        assert_eq!(log[1].ca, Some(425.0));
        assert_eq!(log[1].alk, None);
    }

    #[test]
    fn test_ingest_sort_is_stable() {
        let records: Vec<RawRecord> = serde_json::from_value(json!([
            {"date": "2024-03-05", "ca": "1"},
            {"date": "2024-03-01", "ca": "2"},
            {"date": "2024-03-05", "ca": "3"},
        ]))
        .unwrap();

        let values: Vec<_> = ingest_records(&records).iter().map(|m| m.ca).collect();
        assert_eq!(values, vec![Some(2.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_ingest_ignores_unknown_columns() {
        let records: Vec<RawRecord> =
            serde_json::from_value(json!([{"date": "2024-03-05", "notes": "water change"}]))
                .unwrap();
        let log = ingest_records(&records);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], Measurement::empty(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()));
    }
}
