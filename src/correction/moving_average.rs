//! Moving-average/outlier strategy
//!
//! Computes local mean and standard deviation over a centered window around
//! each point (the candidate itself excluded, so a deep dropout cannot drag
//! the local statistics toward itself) and flags points sitting more than
//! `sigma_threshold` standard deviations *below* the local mean. Only
//! low-side anomalies are targeted: sensors drop out low, not high, so high
//! spikes are left alone. Flagged points are replaced with the local mean.

use tracing::debug;

use super::{round_tenth, FixEvent, ReferenceGate};
use crate::config::CorrectionSettings;
use crate::fields::{self, FieldKey};
use crate::models::Record;
use crate::stats;

/// Valid neighbors required before a window verdict is trusted
const MIN_WINDOW_NEIGHBORS: usize = 3;

pub(crate) fn apply(
    records: &mut [Record],
    targets: &[FieldKey],
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
) -> Vec<FixEvent> {
    let gate = ReferenceGate::new(reference, settings.min_reference_motion, None);
    let window_size = settings.moving_average.window_size;
    let half = window_size / 2;
    let sigma_threshold = settings.moving_average.sigma_threshold;

    let mut fixes = Vec::new();
    for &field in targets {
        let floor = settings.min_valid_for(field);

        for i in 0..records.len() {
            if !gate.permits(i) {
                continue;
            }
            let value = match fields::get(&records[i], field) {
                Some(value) => value,
                None => continue,
            };

            let window: Vec<f64> = (i.saturating_sub(half)..=(i + half).min(records.len() - 1))
                .filter(|k| *k != i)
                .filter_map(|k| fields::get(&records[k], field))
                .collect();
            if window.len() < MIN_WINDOW_NEIGHBORS {
                continue;
            }

            let local_mean = stats::mean(&window);
            let local_stddev = stats::stddev(&window);

            // A zero-variance window gives the 2-sigma rule nothing to work
            // with; fall back to the absolute floor for that case
            let is_outlier = if local_stddev > 0.0 {
                value < local_mean - sigma_threshold * local_stddev
            } else {
                value < floor && value < local_mean
            };
            if !is_outlier {
                continue;
            }

            debug!(
                field = field.canonical(),
                index = i,
                value,
                local_mean,
                local_stddev,
                "replacing low-side outlier with local mean"
            );
            fields::set(&mut records[i], field, round_tenth(local_mean));
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
