//! Windowed contextual strategy
//!
//! For each candidate anomaly this strategy builds a [`WindowAnalysis`] of
//! the valid neighborhood: local statistics, cross-field correlation with
//! the reference signal, workout phase, intensity tier, trend direction,
//! and whether the signal recovers inside the forward half of the window.
//! Detection thresholds adapt to that context — a warmup or recovery
//! stretch tolerates bigger swings than an interval at high intensity — and
//! the replacement value blends the local median, a correlation-weighted
//! reference projection, and temporal smoothing toward the immediate
//! neighbors.

use tracing::debug;

use super::{round_tenth, FixEvent, ReferenceGate};
use crate::config::{ContextualSettings, CorrectionSettings};
use crate::fields::{self, FieldKey};
use crate::models::{IntensityTier, Record, TrendDirection, WorkoutPhase};
use crate::stats;

/// Elapsed-fraction cutoffs for the session-edge phases
const WARMUP_FRACTION: f64 = 0.15;
const COOLDOWN_FRACTION: f64 = 0.85;

/// Coefficient-of-variation above which a local stretch counts as volatile
const VOLATILITY_CUTOFF: f64 = 0.15;

/// Sub-window (samples each side) for phase volatility checks
const PHASE_SUB_WINDOW: usize = 5;

/// Local mean speed breakpoints for the intensity tiers (m/s)
const INTENSITY_MEDIUM_SPEED: f64 = 2.0;
const INTENSITY_HIGH_SPEED: f64 = 3.5;

/// A recovery reading must clear this multiple of the field floor
const RECOVERY_FLOOR_MULTIPLE: f64 = 1.5;

/// Cap on the correlation-projection blend weight
const PROJECTION_WEIGHT_CAP: f64 = 0.4;

/// Ceiling on replacements relative to the previous value
const MAX_JUMP_MULTIPLE: f64 = 2.0;

/// Everything the strategy knows about the neighborhood of one candidate
/// point. Ephemeral; rebuilt per corrected point.
#[derive(Debug, Clone)]
pub struct WindowAnalysis {
    /// Valid neighbor values of the target field, candidate excluded
    pub values: Vec<f64>,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    /// Neighbor coverage ratio: min(1, valid / (window × 0.8))
    pub confidence: f64,
    /// Pearson correlation between target neighbors and paired reference
    /// values; 0.0 with fewer than 3 pairs
    pub correlation: f64,
    /// Local mean target/reference ratio for the projection term
    pub local_ratio: f64,
    pub phase: WorkoutPhase,
    pub intensity: IntensityTier,
    pub trend: TrendDirection,
    /// A qualifying value reappears within the forward half of the window
    pub recovered: bool,
}

/// Session-level context shared by every per-point analysis
struct SessionContext {
    start_time: f64,
    end_time: f64,
    mean_speed: f64,
}

impl SessionContext {
    fn build(records: &[Record], reference: &[Option<f64>]) -> SessionContext {
        let start_time = records
            .first()
            .and_then(|record| fields::get(record, FieldKey::Time))
            .unwrap_or(0.0);
        let end_time = records
            .last()
            .and_then(|record| fields::get(record, FieldKey::Time))
            .unwrap_or(start_time);
        let speeds: Vec<f64> = reference.iter().flatten().copied().collect();
        SessionContext {
            start_time,
            end_time,
            mean_speed: stats::mean(&speeds),
        }
    }

    fn elapsed_fraction(&self, time: f64) -> f64 {
        let duration = self.end_time - self.start_time;
        if duration <= 0.0 {
            return 0.5;
        }
        ((time - self.start_time) / duration).clamp(0.0, 1.0)
    }
}

/// Analyze the neighborhood of `index` for `field`.
pub fn analyze_window(
    records: &[Record],
    index: usize,
    field: FieldKey,
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
) -> WindowAnalysis {
    let context = SessionContext::build(records, reference);
    analyze_with_context(records, index, field, reference, settings, &context)
}

fn analyze_with_context(
    records: &[Record],
    index: usize,
    field: FieldKey,
    reference: &[Option<f64>],
    settings: &CorrectionSettings,
    context: &SessionContext,
) -> WindowAnalysis {
    let window = settings.contextual.analysis_window_size;
    let start = index.saturating_sub(window);
    let end = (index + window).min(records.len().saturating_sub(1));

    let mut values = Vec::new();
    let mut paired_reference = Vec::new();
    let mut ratios = Vec::new();
    for k in start..=end {
        if k == index {
            continue;
        }
        if let Some(value) = fields::get(&records[k], field) {
            if value > 0.0 {
                values.push(value);
                if let Some(reference_value) = reference.get(k).copied().flatten() {
                    paired_reference.push((value, reference_value));
                    if reference_value > 0.0 {
                        ratios.push(value / reference_value);
                    }
                }
            }
        }
    }

    let correlation = if paired_reference.len() >= 3 {
        let (xs, ys): (Vec<f64>, Vec<f64>) = paired_reference.iter().copied().unzip();
        stats::pearson_correlation(&xs, &ys)
    } else {
        0.0
    };

    let confidence = (values.len() as f64 / (window as f64 * 0.8)).min(1.0);

    let floor = settings.min_valid_for(field);
    let recovered = (index + 1..=(index + window).min(records.len().saturating_sub(1)))
        .filter_map(|k| fields::get(&records[k], field))
        .any(|value| value >= floor * RECOVERY_FLOOR_MULTIPLE);

    let time = records
        .get(index)
        .and_then(|record| fields::get(record, FieldKey::Time))
        .unwrap_or(context.start_time);

    WindowAnalysis {
        mean: stats::mean(&values),
        median: stats::median(&values),
        stddev: stats::stddev(&values),
        confidence,
        correlation,
        local_ratio: stats::mean(&ratios),
        phase: classify_phase(records, index, reference, context, time),
        intensity: classify_intensity(reference, index),
        trend: stats::trend_direction(&values),
        recovered,
        values,
    }
}

/// Workout phase from session position and local volatility
fn classify_phase(
    records: &[Record],
    index: usize,
    reference: &[Option<f64>],
    context: &SessionContext,
    time: f64,
) -> WorkoutPhase {
    let fraction = context.elapsed_fraction(time);
    if fraction < WARMUP_FRACTION {
        return WorkoutPhase::Warmup;
    }
    if fraction > COOLDOWN_FRACTION {
        return WorkoutPhase::Cooldown;
    }

    let start = index.saturating_sub(PHASE_SUB_WINDOW);
    let end = (index + PHASE_SUB_WINDOW).min(records.len().saturating_sub(1));

    let local_speeds: Vec<f64> = (start..=end)
        .filter_map(|k| reference.get(k).copied().flatten())
        .collect();
    let volatility = if local_speeds.len() >= 3 {
        local_volatility(&local_speeds)
    } else {
        // Too little speed context: fall back to heart-rate volatility
        let local_hr: Vec<f64> = (start..=end)
            .filter_map(|k| records.get(k))
            .filter_map(|record| fields::get(record, FieldKey::HeartRate))
            .collect();
        local_volatility(&local_hr)
    };

    if volatility > VOLATILITY_CUTOFF {
        let local_mean_speed = stats::mean(&local_speeds);
        if local_mean_speed > context.mean_speed {
            WorkoutPhase::Interval
        } else {
            WorkoutPhase::Recovery
        }
    } else {
        WorkoutPhase::Main
    }
}

fn local_volatility(values: &[f64]) -> f64 {
    let mean = stats::mean(values);
    if mean <= 0.0 {
        return 0.0;
    }
    stats::stddev(values) / mean
}

/// Intensity tier from the local mean reference level
fn classify_intensity(reference: &[Option<f64>], index: usize) -> IntensityTier {
    let start = index.saturating_sub(PHASE_SUB_WINDOW);
    let end = (index + PHASE_SUB_WINDOW).min(reference.len().saturating_sub(1));
    let local: Vec<f64> = (start..=end)
        .filter_map(|k| reference.get(k).copied().flatten())
        .collect();
    let local_mean = stats::mean(&local);

    if local_mean < INTENSITY_MEDIUM_SPEED {
        IntensityTier::Low
    } else if local_mean < INTENSITY_HIGH_SPEED {
        IntensityTier::Medium
    } else {
        IntensityTier::High
    }
}

/// Detection thresholds after phase/intensity/confidence scaling.
/// Warmup, cooldown, and recovery stretches are judged leniently; intervals
/// and high intensity strictly; low confidence widens leniency.
fn adaptive_thresholds(
    analysis: &WindowAnalysis,
    contextual: &ContextualSettings,
    base_min_valid: f64,
) -> (f64, f64) {
    if !contextual.adaptive_thresholds {
        return (contextual.drop_threshold, base_min_valid);
    }

    let (phase_drop, phase_min) = match analysis.phase {
        WorkoutPhase::Warmup | WorkoutPhase::Cooldown => (1.3, 0.7),
        WorkoutPhase::Recovery => (1.25, 0.75),
        WorkoutPhase::Interval => (0.85, 1.1),
        WorkoutPhase::Main => (1.0, 1.0),
    };
    let (intensity_drop, intensity_min) = match analysis.intensity {
        IntensityTier::Low => (1.15, 0.85),
        IntensityTier::Medium => (1.0, 1.0),
        IntensityTier::High => (0.9, 1.05),
    };
    let (confidence_drop, confidence_min) = if analysis.confidence < 0.5 {
        (1.2, 0.8)
    } else {
        (1.0, 1.0)
    };

    let drop = (contextual.drop_threshold * phase_drop * intensity_drop * confidence_drop)
        .min(0.95);
    let min_valid = base_min_valid * phase_min * intensity_min * confidence_min;
    (drop, min_valid)
}

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
    let contextual = &settings.contextual;
    let context = SessionContext::build(records, reference);

    // Widest possible net for the cheap screen; the adaptive verdict below
    // makes the real call
    let screen_drop = contextual.drop_threshold * 0.75;
    let screen_min_scale = 1.2;

    let mut fixes = Vec::new();
    for &field in targets {
        let base_min_valid = settings.min_valid_for(field);

        for i in 1..records.len() {
            if !gate.permits(i) {
                continue;
            }
            let previous = fields::get(&records[i - 1], field);
            let value = fields::get(&records[i], field);
            let (previous, value) = match (previous, value) {
                (Some(previous), Some(value)) => (previous, value),
                _ => continue,
            };

            let candidate = value < previous * (1.0 - screen_drop)
                && value < base_min_valid * screen_min_scale;
            if !candidate {
                continue;
            }

            let analysis =
                analyze_with_context(records, i, field, reference, settings, &context);
            if analysis.values.len() < contextual.min_valid_points_in_window {
                // Not enough context for a confident verdict
                continue;
            }

            let (drop_threshold, min_valid) =
                adaptive_thresholds(&analysis, contextual, base_min_valid);
            let is_anomaly =
                value < previous * (1.0 - drop_threshold) && value < min_valid;
            if !is_anomaly {
                continue;
            }

            let replacement = replacement_value(
                &analysis,
                contextual,
                previous,
                reference[i],
                next_valid(records, i, field, base_min_valid),
                min_valid,
            );

            debug!(
                field = field.canonical(),
                index = i,
                value,
                replacement,
                phase = analysis.phase.as_str(),
                confidence = analysis.confidence,
                correlation = analysis.correlation,
                "contextual repair"
            );

            fields::set(&mut records[i], field, replacement);
            fields::annotate_correction(&mut records[i], field, Some(value));
            fixes.push(FixEvent {
                index: i,
                field,
                phase: Some(analysis.phase),
            });
        }
    }
    fixes
}

/// The immediate next plausible value, for the temporal-smoothing term
fn next_valid(records: &[Record], index: usize, field: FieldKey, floor: f64) -> Option<f64> {
    records
        .get(index + 1)
        .and_then(|record| fields::get(record, field))
        .filter(|value| *value >= floor)
}

/// Blend the reconstruction per the contextual policy. The result is
/// clamped to [min_valid, 2 × previous] and rounded to one decimal.
fn replacement_value(
    analysis: &WindowAnalysis,
    contextual: &ContextualSettings,
    previous: f64,
    reference_value: Option<f64>,
    next: Option<f64>,
    min_valid: f64,
) -> f64 {
    let mut replacement = if analysis.median > 0.0 {
        analysis.median
    } else {
        analysis.mean
    };

    // Correlation-weighted projection of the local reference ratio
    if contextual.multi_field_correlation
        && analysis.correlation.abs() > contextual.correlation_weight_threshold
        && analysis.local_ratio > 0.0
    {
        if let Some(reference_value) = reference_value {
            let projected = analysis.local_ratio * reference_value;
            let weight = analysis.correlation.abs().min(1.0) * PROJECTION_WEIGHT_CAP;
            replacement = replacement * (1.0 - weight) + projected * weight;
        }
    }

    // Temporal smoothing toward the immediate neighbors, bounded by how
    // much of the window we actually saw
    if contextual.temporal_smoothing {
        let anchor = match next {
            Some(next) => (previous + next) / 2.0,
            None => previous,
        };
        let weight = analysis.confidence.min(contextual.smoothing_cap);
        replacement = replacement * (1.0 - weight) + anchor * weight;
    }

    // Phase-specific scaling: intervals run hot, recoveries run cold
    replacement *= match analysis.phase {
        WorkoutPhase::Interval => 1.1,
        WorkoutPhase::Recovery => 0.9,
        _ => 1.0,
    };

    round_tenth(replacement.clamp(min_valid, previous * MAX_JUMP_MULTIPLE))
}
