//! Before/after improvement metrics and derived training statistics
//!
//! The improvement reporter quantifies what a correction pass actually
//! changed: corrected-point counts, dropout counts before and after, and
//! mean-value shifts per field. The derived statistics (normalized power,
//! pace, moving averages) operate on either raw or corrected series and are
//! what downstream charting consumes.

use serde::{Deserialize, Serialize};

use crate::error::{ComparisonError, FitScrubError, Result};
use crate::fields::{self, FieldKey};
use crate::models::Record;

/// Rolling-average window for normalized power, in samples at the 1 Hz
/// recording rate
pub const NP_WINDOW_SECONDS: usize = 30;

/// Readings below this count as dropouts in the before/after comparison
pub const DROPOUT_CUTOFF: f64 = 5.0;

/// Per-field improvement from one correction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldImprovement {
    /// Canonical field name
    pub field: String,

    /// Points carrying the corrected flag
    pub corrected_points: usize,

    /// Dropout readings (value < 5 or == 0) before correction
    pub dropouts_before: usize,

    /// Dropout readings remaining after correction
    pub dropouts_after: usize,

    /// Percent reduction in dropouts; 0 when there were none
    pub dropout_reduction_percent: f64,

    /// Mean of present values before correction
    pub mean_before: f64,

    /// Mean of present values after correction
    pub mean_after: f64,
}

/// Full improvement report across the requested fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub total_points: usize,
    pub fields: Vec<FieldImprovement>,
}

/// Compare an original series against its corrected counterpart.
///
/// The two series must describe the same session: a length mismatch is
/// caller misuse and comes back as an explicit
/// [`ComparisonError::LengthMismatch`] carrying both lengths — never a
/// panic.
pub fn calculate_filter_improvement_metrics(
    original: &[Record],
    corrected: &[Record],
    target_fields: &[FieldKey],
) -> Result<ImprovementReport> {
    if original.len() != corrected.len() {
        return Err(FitScrubError::Comparison(ComparisonError::LengthMismatch {
            original_length: original.len(),
            filtered_length: corrected.len(),
        }));
    }

    let fields_report = target_fields
        .iter()
        .map(|&field| field_improvement(original, corrected, field))
        .collect();

    Ok(ImprovementReport {
        total_points: original.len(),
        fields: fields_report,
    })
}

fn field_improvement(
    original: &[Record],
    corrected: &[Record],
    field: FieldKey,
) -> FieldImprovement {
    let corrected_points = corrected
        .iter()
        .filter(|record| fields::is_corrected(record, field))
        .count();

    let dropouts_before = count_dropouts(original, field);
    let dropouts_after = count_dropouts(corrected, field);
    let dropout_reduction_percent = if dropouts_before == 0 {
        0.0
    } else {
        (dropouts_before.saturating_sub(dropouts_after)) as f64 / dropouts_before as f64 * 100.0
    };

    FieldImprovement {
        field: field.canonical().to_string(),
        corrected_points,
        dropouts_before,
        dropouts_after,
        dropout_reduction_percent,
        mean_before: mean_of_field(original, field),
        mean_after: mean_of_field(corrected, field),
    }
}

fn count_dropouts(records: &[Record], field: FieldKey) -> usize {
    records
        .iter()
        .filter_map(|record| fields::get(record, field))
        .filter(|value| *value < DROPOUT_CUTOFF || *value == 0.0)
        .count()
}

fn mean_of_field(records: &[Record], field: FieldKey) -> f64 {
    let values: Vec<f64> = records
        .iter()
        .filter_map(|record| fields::get(record, field))
        .collect();
    crate::stats::mean(&values)
}

/// Normalized power: 4th-root of the mean of the 4th power of a 30-second
/// moving average of the power series. `None` when the session is shorter
/// than one window.
pub fn normalized_power(records: &[Record]) -> Option<f64> {
    let power: Vec<f64> = records
        .iter()
        .filter_map(|record| fields::get(record, FieldKey::Watt))
        .collect();
    if power.len() < NP_WINDOW_SECONDS {
        return None;
    }

    let rolling: Vec<f64> = power
        .windows(NP_WINDOW_SECONDS)
        .map(|window| window.iter().sum::<f64>() / NP_WINDOW_SECONDS as f64)
        .collect();

    let fourth_mean =
        rolling.iter().map(|avg| avg.powi(4)).sum::<f64>() / rolling.len() as f64;
    Some(fourth_mean.powf(0.25))
}

/// Centered moving-average smoothing for chart series. The window shrinks
/// at the edges; missing (non-finite) inputs pass through untouched.
pub fn smooth_series(values: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || values.len() < 2 {
        return values.to_vec();
    }
    let half = window / 2;
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            if !value.is_finite() {
                return *value;
            }
            let start = i.saturating_sub(half);
            let end = (i + half).min(values.len() - 1);
            let neighborhood: Vec<f64> = values[start..=end]
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            crate::stats::mean(&neighborhood)
        })
        .collect()
}

/// Rowing split: seconds per 500 m at the given speed (m/s). `None` for
/// zero or negative speed.
pub fn pace_per_500m(speed: f64) -> Option<f64> {
    if speed > 0.0 {
        Some(500.0 / speed)
    } else {
        None
    }
}

/// Running/cycling pace: seconds per kilometer at the given speed (m/s)
pub fn pace_per_km(speed: f64) -> Option<f64> {
    if speed > 0.0 {
        Some(1000.0 / speed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrectionSettings;
    use crate::correction::correct;
    use crate::error::ComparisonError;
    use crate::models::record_from_pairs;

    fn session(speed: &[f64], watt: &[f64]) -> Vec<Record> {
        speed
            .iter()
            .zip(watt.iter())
            .enumerate()
            .map(|(i, (s, w))| {
                record_from_pairs(&[("timestamp", i as f64), ("enhanced_speed", *s), ("watt", *w)])
            })
            .collect()
    }

    #[test]
    fn test_length_mismatch_is_error_value_not_panic() {
        let original = session(&[4.0; 10], &[100.0; 10]);
        let corrected = session(&[4.0; 9], &[100.0; 9]);

        let err = calculate_filter_improvement_metrics(&original, &corrected, &[FieldKey::Watt])
            .unwrap_err();
        match err {
            crate::error::FitScrubError::Comparison(ComparisonError::LengthMismatch {
                original_length,
                filtered_length,
            }) => {
                assert_eq!(original_length, 10);
                assert_eq!(filtered_length, 9);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_improvement_after_correction() {
        let speed = vec![4.0; 12];
        let mut watt = vec![200.0; 12];
        watt[5] = 0.0;
        watt[8] = 2.0;
        let original = session(&speed, &watt);

        let outcome = correct(&original, &CorrectionSettings::default());
        let report = calculate_filter_improvement_metrics(
            &original,
            &outcome.records,
            &[FieldKey::Watt],
        )
        .unwrap();

        let watt_report = &report.fields[0];
        assert_eq!(watt_report.field, "watt");
        assert_eq!(watt_report.dropouts_before, 2);
        assert_eq!(watt_report.dropouts_after, 0);
        assert_eq!(watt_report.dropout_reduction_percent, 100.0);
        assert_eq!(watt_report.corrected_points, 2);
        assert!(watt_report.mean_after > watt_report.mean_before);
    }

    #[test]
    fn test_no_dropouts_reports_zero_reduction() {
        let records = session(&[4.0; 5], &[200.0; 5]);
        let report =
            calculate_filter_improvement_metrics(&records, &records, &[FieldKey::Watt]).unwrap();
        assert_eq!(report.fields[0].dropouts_before, 0);
        assert_eq!(report.fields[0].dropout_reduction_percent, 0.0);
    }

    #[test]
    fn test_normalized_power_steady_state_equals_average() {
        // Constant power: every rolling window averages to the same value,
        // so NP equals that value exactly
        let records = session(&vec![4.0; 60], &vec![250.0; 60]);
        let np = normalized_power(&records).unwrap();
        assert!((np - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_power_exceeds_mean_for_variable_effort() {
        let mut watt = Vec::new();
        for block in 0..4 {
            let level = if block % 2 == 0 { 100.0 } else { 400.0 };
            watt.extend(std::iter::repeat(level).take(30));
        }
        let records = session(&vec![4.0; watt.len()], &watt);

        let np = normalized_power(&records).unwrap();
        let avg = 250.0;
        assert!(np > avg, "np {} should exceed plain average {}", np, avg);
    }

    #[test]
    fn test_normalized_power_requires_full_window() {
        let records = session(&[4.0; 10], &[250.0; 10]);
        assert!(normalized_power(&records).is_none());
    }

    #[test]
    fn test_smooth_series() {
        let smoothed = smooth_series(&[10.0, 10.0, 40.0, 10.0, 10.0], 3);
        assert_eq!(smoothed.len(), 5);
        assert!(smoothed[2] < 40.0);
        assert!(smoothed[1] > 10.0);
    }

    #[test]
    fn test_pace_helpers() {
        assert_eq!(pace_per_500m(5.0), Some(100.0));
        assert_eq!(pace_per_km(2.5), Some(400.0));
        assert_eq!(pace_per_500m(0.0), None);
        assert_eq!(pace_per_km(-1.0), None);
    }
}
