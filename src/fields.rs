//! Logical field access over duck-typed records
//!
//! Upstream data sources are inconsistent in naming: the same logical field
//! arrives as "stroke rate", "stroke_rate", or "Stroke Rate" depending on
//! the exporting device. This module maps a canonical [`FieldKey`] to an
//! ordered list of accepted spellings (a pure lookup table, no runtime
//! reflection) and reads/writes values uniformly through it.

use crate::models::Record;
use serde_json::Value;

/// Canonical names for the logical fields the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Seconds elapsed since session start; required on every record
    Time,
    /// Reference motion field, meters per second
    Speed,
    /// Strokes per minute (rowing/paddling)
    StrokeRate,
    /// Power output in watts
    Watt,
    /// Beats per minute
    HeartRate,
}

impl FieldKey {
    /// Canonical spelling, used for annotation keys and stats maps
    pub fn canonical(&self) -> &'static str {
        match self {
            FieldKey::Time => "timestamp",
            FieldKey::Speed => "enhanced_speed",
            FieldKey::StrokeRate => "stroke_rate",
            FieldKey::Watt => "watt",
            FieldKey::HeartRate => "heart_rate",
        }
    }

    /// Accepted spellings, in resolution order. The canonical name always
    /// comes first so writes round-trip through reads.
    pub fn variants(&self) -> &'static [&'static str] {
        match self {
            FieldKey::Time => &["timestamp", "time", "elapsed_time"],
            FieldKey::Speed => &["enhanced_speed", "speed", "Enhanced Speed", "Speed"],
            FieldKey::StrokeRate => &[
                "stroke_rate",
                "stroke rate",
                "Stroke Rate",
                "STROKE_RATE",
                "cadence",
            ],
            FieldKey::Watt => &["watt", "watts", "power", "Watt", "Power"],
            FieldKey::HeartRate => &["heart_rate", "heart rate", "Heart Rate", "hr"],
        }
    }

    /// Parse a user-supplied field name (CLI, config) into a key
    pub fn parse(name: &str) -> Option<FieldKey> {
        let normalized = name.trim().to_lowercase().replace(' ', "_");
        match normalized.as_str() {
            "timestamp" | "time" | "elapsed_time" => Some(FieldKey::Time),
            "enhanced_speed" | "speed" => Some(FieldKey::Speed),
            "stroke_rate" | "cadence" => Some(FieldKey::StrokeRate),
            "watt" | "watts" | "power" => Some(FieldKey::Watt),
            "heart_rate" | "hr" => Some(FieldKey::HeartRate),
            _ => None,
        }
    }

    /// Minimum plausible reading for this field while the reference signal
    /// indicates real motion. Used by the correlation and Kalman validity
    /// checks as an absolute floor.
    pub fn noise_floor(&self) -> f64 {
        match self {
            FieldKey::StrokeRate => 10.0,
            FieldKey::Watt => 30.0,
            FieldKey::HeartRate => 40.0,
            FieldKey::Time | FieldKey::Speed => 0.0,
        }
    }

    /// Reference (speed) level above which the noise floor applies
    pub fn floor_reference_threshold(&self) -> f64 {
        1.5
    }
}

/// Read a logical field: the first spelling variant present with a finite
/// numeric value wins. Null, non-numeric, and non-finite values count as
/// absent.
pub fn get(record: &Record, field: FieldKey) -> Option<f64> {
    for variant in field.variants() {
        if let Some(value) = record.get(*variant) {
            if let Some(number) = as_finite_f64(value) {
                return Some(number);
            }
        }
    }
    None
}

/// Write a logical field back into whichever spelling variant the record
/// already carries, preserving the record's original key. Falls back to the
/// canonical name for records that never had the field.
pub fn set(record: &mut Record, field: FieldKey, value: f64) {
    let key = field
        .variants()
        .iter()
        .find(|variant| record.contains_key(**variant))
        .copied()
        .unwrap_or_else(|| field.canonical());
    insert_number(record, key, value);
}

/// Key holding the pre-correction value for a field
pub fn original_key(field: FieldKey) -> String {
    format!("{}_original", field.canonical())
}

/// Key holding the corrected-flag for a field
pub fn corrected_key(field: FieldKey) -> String {
    format!("{}_corrected", field.canonical())
}

/// Key holding the Kalman filtered estimate for a field
pub fn filtered_key(field: FieldKey) -> String {
    format!("{}_filtered", field.canonical())
}

/// Record the side-channel annotation for a correction: the pre-correction
/// value and the corrected flag. Additive; never replaces other fields.
pub fn annotate_correction(record: &mut Record, field: FieldKey, original: Option<f64>) {
    if let Some(value) = original {
        insert_number(record, &original_key(field), value);
    } else {
        record.insert(original_key(field), Value::Null);
    }
    record.insert(corrected_key(field), Value::Bool(true));
}

/// Whether a record carries the corrected flag for a field
pub fn is_corrected(record: &Record, field: FieldKey) -> bool {
    record
        .get(&corrected_key(field))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn as_finite_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn insert_number(record: &mut Record, key: &str, value: f64) {
    if let Some(number) = serde_json::Number::from_f64(value) {
        record.insert(key.to_string(), Value::Number(number));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record_from_pairs;
    use serde_json::Value;

    #[test]
    fn test_get_resolves_spelling_variants() {
        let mut record = Record::new();
        record.insert("stroke rate".to_string(), serde_json::json!(24.5));
        assert_eq!(get(&record, FieldKey::StrokeRate), Some(24.5));

        let record = record_from_pairs(&[("enhanced_speed", 3.2)]);
        assert_eq!(get(&record, FieldKey::Speed), Some(3.2));
    }

    #[test]
    fn test_get_skips_null_and_non_numeric() {
        let mut record = Record::new();
        record.insert("watt".to_string(), Value::Null);
        record.insert("power".to_string(), serde_json::json!(190.0));
        // Null "watt" is absent; the "power" variant wins
        assert_eq!(get(&record, FieldKey::Watt), Some(190.0));

        let mut record = Record::new();
        record.insert("watt".to_string(), serde_json::json!("broken"));
        assert_eq!(get(&record, FieldKey::Watt), None);
    }

    #[test]
    fn test_set_preserves_existing_key() {
        let mut record = Record::new();
        record.insert("stroke rate".to_string(), serde_json::json!(10.0));
        set(&mut record, FieldKey::StrokeRate, 22.0);
        assert_eq!(
            record.get("stroke rate").and_then(Value::as_f64),
            Some(22.0)
        );
        assert!(!record.contains_key("stroke_rate"));
    }

    #[test]
    fn test_set_falls_back_to_canonical() {
        let mut record = Record::new();
        set(&mut record, FieldKey::Watt, 150.0);
        assert_eq!(record.get("watt").and_then(Value::as_f64), Some(150.0));
    }

    #[test]
    fn test_annotation_keys() {
        assert_eq!(original_key(FieldKey::Watt), "watt_original");
        assert_eq!(corrected_key(FieldKey::StrokeRate), "stroke_rate_corrected");
        assert_eq!(filtered_key(FieldKey::Watt), "watt_filtered");
    }

    #[test]
    fn test_annotate_correction() {
        let mut record = record_from_pairs(&[("watt", 100.0)]);
        annotate_correction(&mut record, FieldKey::Watt, Some(5.0));
        assert_eq!(
            record.get("watt_original").and_then(Value::as_f64),
            Some(5.0)
        );
        assert!(is_corrected(&record, FieldKey::Watt));
        // Additive: the live value is untouched by annotation
        assert_eq!(get(&record, FieldKey::Watt), Some(100.0));
    }

    #[test]
    fn test_parse_field_names() {
        assert_eq!(FieldKey::parse("Stroke Rate"), Some(FieldKey::StrokeRate));
        assert_eq!(FieldKey::parse("watt"), Some(FieldKey::Watt));
        assert_eq!(FieldKey::parse("unknown"), None);
    }
}
