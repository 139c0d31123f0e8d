//! Sensor-noise correction engine
//!
//! Detects and repairs transient sensor dropouts — sudden implausible drops
//! in a noisy field (stroke rate, power) while a trusted reference field
//! (speed) remains stable — and reconstructs plausible values. Five
//! strategies are available; `auto` resolves to the correlation strategy,
//! which performs best empirically.
//!
//! The orchestrator works on an owned deep copy of the input ("working
//! set") so the caller's series stays available for before/after
//! comparison. The working set is mutated in place, left to right, in a
//! single pass: a fix at index i is visible to window lookups at i+1.
//! Callers must not parallelize across indices of one series; separate
//! sessions can run concurrently.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::config::CorrectionSettings;
use crate::fields::{self, FieldKey};
use crate::models::{CorrectionOutcome, CorrectionStats, Record, WorkoutPhase};

pub mod contextual;
pub mod correlation;
pub mod kalman;
pub mod moving_average;
pub mod threshold;

/// Correction strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionMethod {
    /// Single-step drop detection with interpolation repair
    Threshold,
    /// Centered-window statistical outlier replacement
    MovingAverage,
    /// Cross-field ratio model against the reference signal
    Correlation,
    /// Scalar Kalman filter per field
    Kalman,
    /// Windowed contextual analysis with adaptive thresholds
    Contextual,
    /// Alias for `Correlation`, the documented default
    Auto,
}

impl CorrectionMethod {
    /// Resolve the `auto` alias to its concrete strategy
    pub fn resolve(&self) -> CorrectionMethod {
        match self {
            CorrectionMethod::Auto => CorrectionMethod::Correlation,
            other => *other,
        }
    }
}

impl Default for CorrectionMethod {
    fn default() -> Self {
        CorrectionMethod::Auto
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrectionMethod::Threshold => "threshold",
            CorrectionMethod::MovingAverage => "moving-average",
            CorrectionMethod::Correlation => "correlation",
            CorrectionMethod::Kalman => "kalman",
            CorrectionMethod::Contextual => "contextual",
            CorrectionMethod::Auto => "auto",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CorrectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "threshold" => Ok(CorrectionMethod::Threshold),
            "moving-average" | "movingaverage" => Ok(CorrectionMethod::MovingAverage),
            "correlation" => Ok(CorrectionMethod::Correlation),
            "kalman" => Ok(CorrectionMethod::Kalman),
            "contextual" => Ok(CorrectionMethod::Contextual),
            "auto" => Ok(CorrectionMethod::Auto),
            other => Err(format!("Unknown correction method: {}", other)),
        }
    }
}

/// One applied fix, reported by a strategy back to the orchestrator
#[derive(Debug, Clone)]
pub(crate) struct FixEvent {
    pub index: usize,
    pub field: FieldKey,
    /// Populated by the contextual strategy only
    pub phase: Option<WorkoutPhase>,
}

/// Per-point precondition shared by all strategies: corrections are only
/// attempted while the reference field is in real motion and, where the
/// strategy defines one, stable across the step. A real reference drop is
/// expected to cause a real target drop, so an unstable reference means the
/// target drop is plausible.
pub(crate) struct ReferenceGate<'a> {
    reference: &'a [Option<f64>],
    min_motion: f64,
    stability_percent: Option<f64>,
}

impl<'a> ReferenceGate<'a> {
    pub fn new(
        reference: &'a [Option<f64>],
        min_motion: f64,
        stability_percent: Option<f64>,
    ) -> Self {
        Self {
            reference,
            min_motion,
            stability_percent,
        }
    }

    /// Reference value at an index, if present
    pub fn value(&self, index: usize) -> Option<f64> {
        self.reference.get(index).copied().flatten()
    }

    /// Whether the reference indicates real motion at this index
    pub fn in_motion(&self, index: usize) -> bool {
        matches!(self.value(index), Some(speed) if speed > self.min_motion)
    }

    /// Whether correction may be attempted at this index. A missing
    /// reference value means no information, so the point is skipped for
    /// detection purposes (never discarded).
    pub fn permits(&self, index: usize) -> bool {
        if !self.in_motion(index) {
            return false;
        }
        match self.stability_percent {
            None => true,
            Some(max_percent) => {
                if index == 0 {
                    return false;
                }
                match (self.value(index - 1), self.value(index)) {
                    (Some(prev), Some(current)) if prev > 0.0 => {
                        ((current - prev) / prev).abs() * 100.0 <= max_percent
                    }
                    _ => false,
                }
            }
        }
    }
}

/// Round a reconstructed value to one decimal, the precision charts use
pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Run the configured strategy over a session.
///
/// Returns the corrected working set plus run statistics; `records` itself
/// is never mutated. Length and order are always preserved.
pub fn correct(records: &[Record], settings: &CorrectionSettings) -> CorrectionOutcome {
    NoiseCorrector::new(settings.clone()).correct(records)
}

/// Correction orchestrator: owns the settings and drives one strategy
/// across a session
pub struct NoiseCorrector {
    settings: CorrectionSettings,
}

impl NoiseCorrector {
    pub fn new(settings: CorrectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CorrectionSettings {
        &self.settings
    }

    /// Apply the configured strategy to a session
    pub fn correct(&self, records: &[Record]) -> CorrectionOutcome {
        let mut working: Vec<Record> = records.to_vec();
        let method = self.settings.method.resolve();

        let targets: Vec<FieldKey> = self
            .settings
            .resolved_targets()
            .into_iter()
            .filter(|field| !matches!(field, FieldKey::Time | FieldKey::Speed))
            .collect();

        let reference_field =
            FieldKey::parse(&self.settings.reference_field).unwrap_or(FieldKey::Speed);
        let reference: Vec<Option<f64>> = working
            .iter()
            .map(|record| fields::get(record, reference_field))
            .collect();

        let fixes = if working.len() < 2 || targets.is_empty() {
            Vec::new()
        } else {
            match method {
                CorrectionMethod::Threshold => {
                    threshold::apply(&mut working, &targets, &reference, &self.settings)
                }
                CorrectionMethod::MovingAverage => {
                    moving_average::apply(&mut working, &targets, &reference, &self.settings)
                }
                CorrectionMethod::Correlation => {
                    correlation::apply(&mut working, &targets, &reference, &self.settings)
                }
                CorrectionMethod::Kalman => {
                    kalman::apply(&mut working, &targets, &reference, &self.settings)
                }
                CorrectionMethod::Contextual => {
                    contextual::apply(&mut working, &targets, &reference, &self.settings)
                }
                CorrectionMethod::Auto => unreachable!("auto resolves to correlation"),
            }
        };

        let stats = self.build_stats(records.len(), method, &fixes);
        info!(
            method = %method,
            total_points = stats.total_points,
            noisy_points = stats.noisy_points,
            quality_score = stats.quality_score,
            "correction pass complete"
        );

        CorrectionOutcome {
            records: working,
            stats,
        }
    }

    fn build_stats(
        &self,
        total_points: usize,
        method: CorrectionMethod,
        fixes: &[FixEvent],
    ) -> CorrectionStats {
        let mut stats = CorrectionStats {
            total_points,
            ..Default::default()
        };

        let mut noisy_indices = HashSet::new();
        for fix in fixes {
            noisy_indices.insert(fix.index);
            *stats
                .fixed_fields
                .entry(fix.field.canonical().to_string())
                .or_insert(0) += 1;
        }
        stats.noisy_points = noisy_indices.len();

        if method == CorrectionMethod::Contextual {
            let mut phases = std::collections::HashMap::new();
            for fix in fixes {
                if let Some(phase) = fix.phase {
                    *phases.entry(phase).or_insert(0) += 1;
                }
            }
            stats.phase_analysis = Some(phases);
        }

        stats.finalize();
        stats
    }
}
