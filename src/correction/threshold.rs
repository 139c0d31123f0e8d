//! Threshold strategy: single-step drop detection with interpolation repair
//!
//! A point is a dropout when the field falls by more than the configured
//! fraction in one step, lands below the minimum stable reading, and the
//! reference field stayed stable over the same step. Repair interpolates
//! linearly from the last known-good value to the next point where the
//! field returns to a stable reading; a gap that never recovers holds the
//! last known-good value to the end of the session.

use tracing::debug;

use super::{round_tenth, FixEvent, ReferenceGate};
use crate::config::CorrectionSettings;
use crate::fields::{self, FieldKey};
use crate::models::Record;

pub(crate) fn apply(
    records: &mut [Record],
    targets: &[FieldKey],
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
) -> Vec<FixEvent> {
    let gate = ReferenceGate::new(
        reference,
        settings.min_reference_motion,
        Some(settings.threshold.speed_stability_threshold),
    );
    let drop_threshold = settings.threshold.drop_threshold;

    let mut fixes = Vec::new();
    for &field in targets {
        let min_stable = settings.min_valid_for(field);

        let mut i = 1;
        while i < records.len() {
            if !gate.permits(i) {
                i += 1;
                continue;
            }

            let previous = fields::get(&records[i - 1], field);
            let current = fields::get(&records[i], field);
            let (previous, current) = match (previous, current) {
                (Some(previous), Some(current)) => (previous, current),
                // Missing values carry no information; skip the point
                _ => {
                    i += 1;
                    continue;
                }
            };

            let is_dropout =
                current < previous * (1.0 - drop_threshold) && current < min_stable;
            if !is_dropout {
                i += 1;
                continue;
            }

            // Find where the signal recovers to a stable reading
            let recovery = (i + 1..records.len()).find_map(|j| {
                fields::get(&records[j], field)
                    .filter(|value| *value >= min_stable)
                    .map(|value| (j, value))
            });

            match recovery {
                Some((recovery_index, recovery_value)) => {
                    debug!(
                        field = field.canonical(),
                        gap_start = i,
                        gap_end = recovery_index,
                        "interpolating dropout gap"
                    );
                    let anchor = i - 1;
                    let span = (recovery_index - anchor) as f64;
                    for k in i..recovery_index {
                        let fraction = (k - anchor) as f64 / span;
                        let value = previous + (recovery_value - previous) * fraction;
                        repair(records, k, field, value.max(min_stable), &mut fixes);
                    }
                    i = recovery_index;
                }
                None => {
                    debug!(
                        field = field.canonical(),
                        gap_start = i,
                        "no recovery point; holding last known-good value"
                    );
                    for k in i..records.len() {
                        repair(records, k, field, previous.max(min_stable), &mut fixes);
                    }
                    i = records.len();
                }
            }
        }
    }
    fixes
}

fn repair(
    records: &mut [Record],
    index: usize,
    field: FieldKey,
    value: f64,
    fixes: &mut Vec<FixEvent>,
) {
    let original = fields::get(&records[index], field);
    fields::set(&mut records[index], field, round_tenth(value));
    fields::annotate_correction(&mut records[index], field, original);
    fixes.push(FixEvent {
        index,
        field,
        phase: None,
    });
}
