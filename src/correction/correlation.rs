//! Correlation-based strategy (the `auto` default)
//!
//! A first pass establishes, per target field, how the field normally moves
//! with the reference signal: the Pearson correlation and the distribution
//! (mean, stddev) of the target/reference ratio over valid pairs. The
//! second pass flags points that fall outside that learned envelope while
//! the reference says the athlete is still moving, then repairs them from
//! the nearest plausible neighbors.

use tracing::debug;

use super::{round_tenth, FixEvent, ReferenceGate};
use crate::config::CorrectionSettings;
use crate::fields::{self, FieldKey};
use crate::models::Record;
use crate::stats;

/// Per-field relationship with the reference signal, learned in pass 1
#[derive(Debug, Clone, Copy)]
struct FieldModel {
    correlation: f64,
    ratio_mean: f64,
    ratio_stddev: f64,
    sample_count: usize,
}

impl FieldModel {
    fn learn(
        records: &[Record],
        field: FieldKey,
        reference: &[Option<f64>],
        min_samples: usize,
    ) -> Option<FieldModel> {
        let mut targets = Vec::new();
        let mut references = Vec::new();
        let mut ratios = Vec::new();

        for (record, reference_value) in records.iter().zip(reference.iter()) {
            let target = fields::get(record, field);
            if let (Some(target), Some(reference_value)) = (target, *reference_value) {
                if target > 0.0 && reference_value > 0.0 {
                    targets.push(target);
                    references.push(reference_value);
                    ratios.push(target / reference_value);
                }
            }
        }

        if ratios.len() <= min_samples {
            return None;
        }

        Some(FieldModel {
            correlation: stats::pearson_correlation(&targets, &references),
            ratio_mean: stats::mean(&ratios),
            ratio_stddev: stats::stddev(&ratios),
            sample_count: ratios.len(),
        })
    }

    /// Lower bound on a plausible value given the current reference level
    fn lower_bound(&self, reference_value: f64, slack: f64) -> f64 {
        (self.ratio_mean - 2.0 * self.ratio_stddev) * reference_value * slack
    }

    /// Expected value at the current reference level
    fn expected(&self, reference_value: f64) -> f64 {
        self.ratio_mean * reference_value
    }
}

pub(crate) fn apply(
    records: &mut [Record],
    targets: &[FieldKey],
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
) -> Vec<FixEvent> {
    let gate = ReferenceGate::new(reference, settings.min_reference_motion, None);
    let rules = &settings.correlation;

    let mut fixes = Vec::new();
    for &field in targets {
        let model = FieldModel::learn(records, field, reference, rules.min_ratio_samples);
        if let Some(model) = model {
            debug!(
                field = field.canonical(),
                correlation = model.correlation,
                ratio_mean = model.ratio_mean,
                ratio_stddev = model.ratio_stddev,
                samples = model.sample_count,
                "learned reference relationship"
            );
        }

        let min_valid = settings.min_valid_for(field);
        for i in 1..records.len() {
            if !gate.permits(i) {
                continue;
            }
            let reference_value = match gate.value(i) {
                Some(value) => value,
                None => continue,
            };
            let value = match fields::get(&records[i], field) {
                Some(value) => value,
                None => continue,
            };

            let absolute_low =
                value < rules.low_value_cutoff && reference_value > rules.low_value_reference;

            let below_ratio_envelope = model
                .map(|model| {
                    reference_value > rules.ratio_reference
                        && value < model.lower_bound(reference_value, rules.ratio_slack)
                })
                .unwrap_or(false);

            let sudden_drop = fields::get(&records[i - 1], field)
                .map(|previous| {
                    value < previous * (1.0 - rules.single_step_drop)
                        && reference_value > rules.step_reference
                })
                .unwrap_or(false);

            let below_floor =
                value < min_valid && reference_value > field.floor_reference_threshold();

            if !(absolute_low || below_ratio_envelope || sudden_drop || below_floor) {
                continue;
            }

            let replacement =
                replacement_value(records, i, field, min_valid, reference_value, model.as_ref());
            debug!(
                field = field.canonical(),
                index = i,
                value,
                replacement,
                absolute_low,
                below_ratio_envelope,
                sudden_drop,
                below_floor,
                "repairing dropout"
            );

            fields::set(&mut records[i], field, round_tenth(replacement));
            fields::annotate_correction(&mut records[i], field, Some(value));
            fixes.push(FixEvent {
                index: i,
                field,
                phase: None,
            });
        }
    }
    fixes
}

/// Interpolate between the nearest plausible neighbors, searching outward in
/// both directions. One-sided gaps use the single neighbor; a point with no
/// plausible neighbor at all falls back to the reference-derived expected
/// value. The result never goes below the field's minimum valid value.
fn replacement_value(
    records: &[Record],
    index: usize,
    field: FieldKey,
    min_valid: f64,
    reference_value: f64,
    model: Option<&FieldModel>,
) -> f64 {
    let is_plausible = |k: usize| -> Option<f64> {
        fields::get(&records[k], field).filter(|value| *value >= min_valid)
    };

    let left = (0..index).rev().find_map(|k| is_plausible(k).map(|v| (index - k, v)));
    let right =
        (index + 1..records.len()).find_map(|k| is_plausible(k).map(|v| (k - index, v)));

    let raw = match (left, right) {
        (Some((left_distance, left_value)), Some((right_distance, right_value))) => {
            let total = (left_distance + right_distance) as f64;
            left_value * (right_distance as f64 / total)
                + right_value * (left_distance as f64 / total)
        }
        (Some((_, left_value)), None) => left_value,
        (None, Some((_, right_value))) => right_value,
        (None, None) => model
            .map(|model| model.expected(reference_value))
            .unwrap_or(min_valid),
    };

    raw.max(min_valid)
}
