//! Kalman strategy: scalar state estimation per field
//!
//! Runs a one-dimensional Kalman filter (state = field value, fixed process
//! and measurement noise) along each target field. Each step predicts, then
//! judges the raw measurement: a valid reading updates the filter normally,
//! an invalid one (missing/zero, drop-threshold violation, sustained drop,
//! or implausibly low while the reference shows motion) makes the filter
//! coast on its own prediction — the estimate carries forward and the error
//! covariance keeps inflating until a real measurement arrives.
//!
//! Corrected points get the usual annotations; in addition the filtered
//! estimate is stored for every point under `<field>_filtered` for
//! diagnostic and chart use.
//!
//! The Kalman strategy carries its own motion heuristics with constants
//! separate from the orchestrator gate; see `KalmanSettings`.

use tracing::debug;

use super::{round_tenth, FixEvent};
use crate::config::{CorrectionSettings, KalmanSettings};
use crate::fields::{self, FieldKey};
use crate::models::Record;
use serde_json::Value;

/// One-dimensional Kalman filter over a single telemetry field
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    estimate: f64,
    error_covariance: f64,
    process_noise: f64,
    measurement_noise: f64,
    initialized: bool,
}

impl ScalarKalman {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            estimate: 0.0,
            error_covariance: measurement_noise,
            process_noise,
            measurement_noise,
            initialized: false,
        }
    }

    pub fn from_settings(settings: &KalmanSettings) -> Self {
        Self::new(settings.process_noise, settings.measurement_noise)
    }

    /// Seed the state from the first trustworthy measurement
    pub fn initialize(&mut self, measurement: f64) {
        self.estimate = measurement;
        self.error_covariance = self.measurement_noise;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Time update: inflate the error covariance by the process noise
    pub fn predict(&mut self) {
        self.error_covariance += self.process_noise;
    }

    /// Measurement update with a real observation
    pub fn update(&mut self, measurement: f64) {
        let gain = self.error_covariance / (self.error_covariance + self.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance *= 1.0 - gain;
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn error_covariance(&self) -> f64 {
        self.error_covariance
    }
}

pub(crate) fn apply(
    records: &mut [Record],
    targets: &[FieldKey],
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
) -> Vec<FixEvent> {
    let kalman = &settings.kalman;

    let mut fixes = Vec::new();
    for &field in targets {
        let mut filter = ScalarKalman::from_settings(kalman);
        let filtered_key = fields::filtered_key(field);

        for i in 0..records.len() {
            let raw = fields::get(&records[i], field);
            let in_motion = reference[i].map(|speed| speed > kalman.motion_threshold) == Some(true);

            if !filter.is_initialized() {
                if let Some(value) = raw.filter(|value| *value > 0.0) {
                    filter.initialize(value);
                    write_filtered(&mut records[i], &filtered_key, filter.estimate());
                }
                continue;
            }

            filter.predict();

            if !in_motion {
                // Stationary or unknown reference: a low or missing reading
                // is plausibly real, so never rewrite it. Present readings
                // still feed the filter.
                if let Some(value) = raw.filter(|value| *value > 0.0) {
                    filter.update(value);
                }
                write_filtered(&mut records[i], &filtered_key, filter.estimate());
                continue;
            }

            let valid = measurement_valid(records, i, field, raw, kalman);
            if let (true, Some(value)) = (valid, raw) {
                filter.update(value);
            } else {
                // Coast through the gap on the prediction alone; the
                // covariance keeps growing until a real measurement returns
                debug!(
                    field = field.canonical(),
                    index = i,
                    raw = ?raw,
                    estimate = filter.estimate(),
                    error_covariance = filter.error_covariance(),
                    "invalid measurement; coasting on prediction"
                );
                fields::set(&mut records[i], field, round_tenth(filter.estimate()));
                fields::annotate_correction(&mut records[i], field, raw);
                fixes.push(FixEvent {
                    index: i,
                    field,
                    phase: None,
                });
            }

            write_filtered(&mut records[i], &filtered_key, filter.estimate());
        }
    }
    fixes
}

/// Judge the raw reading at index i. Previous values are read from the
/// working set, so earlier fixes take part in the drop checks.
fn measurement_valid(
    records: &[Record],
    index: usize,
    field: FieldKey,
    raw: Option<f64>,
    kalman: &KalmanSettings,
) -> bool {
    let value = match raw {
        Some(value) if value > 0.0 => value,
        // Missing or zero while the reference shows motion
        _ => return false,
    };

    let previous = fields::get(&records[index - 1], field);
    if let Some(previous) = previous {
        if value < previous * (1.0 - kalman.drop_threshold) {
            return false;
        }
    }

    // Sustained drop confirmed two points back
    if index >= 2 {
        if let (Some(two_back), Some(previous)) =
            (fields::get(&records[index - 2], field), previous)
        {
            let cutoff = two_back * (1.0 - kalman.drop_threshold);
            if value < cutoff && previous < cutoff {
                return false;
            }
        }
    }

    // In motion but implausibly low for this sensor
    if value < field.noise_floor() {
        return false;
    }

    true
}

fn write_filtered(record: &mut Record, key: &str, estimate: f64) {
    if let Some(number) = serde_json::Number::from_f64(round_tenth(estimate)) {
        record.insert(key.to_string(), Value::Number(number));
    }
}
