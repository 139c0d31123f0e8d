//! Correction settings with documented defaults and TOML persistence
//!
//! Every tunable of the correction engine lives here, grouped per strategy.
//! Stability constants are deliberately parameterized per strategy rather
//! than shared: the threshold/correlation reference-stability check and the
//! Kalman motion heuristics use different formulas and constants, and
//! unifying them would change detection behavior.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::correction::CorrectionMethod;
use crate::fields::FieldKey;

/// Full configuration surface for one correction run. Read-only during a
/// run; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionSettings {
    /// Strategy to drive. `auto` resolves to the correlation strategy,
    /// the documented default (performs best empirically).
    pub method: CorrectionMethod,

    /// Logical fields to correct (canonical names)
    pub target_fields: Vec<String>,

    /// Reference motion field name
    pub reference_field: String,

    /// Reference level (m/s) below which the session counts as stationary
    /// and no corrections are attempted. A real reference drop is expected
    /// to cause a real target drop.
    pub min_reference_motion: f64,

    /// Minimum valid stroke rate (strokes/min); corrected values never go
    /// below this
    pub min_valid_stroke_rate: f64,

    /// Minimum valid power (watts); corrected values never go below this
    pub min_valid_watt: f64,

    pub threshold: ThresholdSettings,
    pub moving_average: MovingAverageSettings,
    pub correlation: CorrelationSettings,
    pub kalman: KalmanSettings,
    pub contextual: ContextualSettings,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            method: CorrectionMethod::Auto,
            target_fields: vec!["stroke_rate".to_string(), "watt".to_string()],
            reference_field: "enhanced_speed".to_string(),
            min_reference_motion: 0.5,
            min_valid_stroke_rate: 10.0,
            min_valid_watt: 30.0,
            threshold: ThresholdSettings::default(),
            moving_average: MovingAverageSettings::default(),
            correlation: CorrelationSettings::default(),
            kalman: KalmanSettings::default(),
            contextual: ContextualSettings::default(),
        }
    }
}

impl CorrectionSettings {
    /// Minimum valid reading for a field, falling back to the field's
    /// built-in noise floor for fields without a dedicated setting
    pub fn min_valid_for(&self, field: FieldKey) -> f64 {
        match field {
            FieldKey::StrokeRate => self.min_valid_stroke_rate,
            FieldKey::Watt => self.min_valid_watt,
            _ => field.noise_floor(),
        }
    }

    /// Resolve configured target field names to keys, skipping unknown
    /// names with a warning
    pub fn resolved_targets(&self) -> Vec<FieldKey> {
        self.target_fields
            .iter()
            .filter_map(|name| {
                let key = FieldKey::parse(name);
                if key.is_none() {
                    tracing::warn!("Ignoring unknown target field '{}'", name);
                }
                key
            })
            .collect()
    }

    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;
        let settings: CorrectionSettings =
            toml::from_str(&content).with_context(|| "Failed to parse TOML settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize settings to TOML")?;
        fs::write(&path, toml_content).with_context(|| {
            format!("Failed to write settings file: {}", path.as_ref().display())
        })?;
        Ok(())
    }

    /// Default settings path under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fitscrub").join("settings.toml"))
    }

    /// Sanity-check ranges that would otherwise silently disable detection
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold.drop_threshold) {
            anyhow::bail!(
                "threshold.drop_threshold must be a fraction in [0, 1), got {}",
                self.threshold.drop_threshold
            );
        }
        if self.moving_average.window_size < 3 {
            anyhow::bail!(
                "moving_average.window_size must be at least 3, got {}",
                self.moving_average.window_size
            );
        }
        if self.contextual.analysis_window_size < 3 {
            anyhow::bail!(
                "contextual.analysis_window_size must be at least 3, got {}",
                self.contextual.analysis_window_size
            );
        }
        if self.kalman.process_noise <= 0.0 || self.kalman.measurement_noise <= 0.0 {
            anyhow::bail!("kalman noise constants must be positive");
        }
        Ok(())
    }
}

/// Threshold strategy tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    /// Fractional single-step drop that flags a dropout (0.5 = 50%)
    pub drop_threshold: f64,

    /// Maximum reference change (percent) over one step for the reference
    /// to count as stable
    pub speed_stability_threshold: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            drop_threshold: 0.5,
            speed_stability_threshold: 20.0,
        }
    }
}

/// Moving-average/outlier strategy tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageSettings {
    /// Centered window size in samples
    pub window_size: usize,

    /// How many standard deviations below the local mean flags an outlier.
    /// Only low-side anomalies are targeted; sensors drop out low, not high.
    pub sigma_threshold: f64,
}

impl Default for MovingAverageSettings {
    fn default() -> Self {
        Self {
            window_size: 5,
            sigma_threshold: 2.0,
        }
    }
}

/// Correlation-based strategy tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Minimum valid (target>0, reference>0) pairs before the ratio model
    /// is trusted
    pub min_ratio_samples: usize,

    /// Slack factor applied to the ratio-based lower bound
    pub ratio_slack: f64,

    /// Fractional single-step drop that flags a dropout
    pub single_step_drop: f64,

    /// Absolute low-value cutoff: value below this while the reference is
    /// above `low_value_reference` is always a dropout
    pub low_value_cutoff: f64,

    /// Reference level gating the absolute low-value rule
    pub low_value_reference: f64,

    /// Reference level gating the ratio-bound rule
    pub ratio_reference: f64,

    /// Reference level gating the single-step-drop rule
    pub step_reference: f64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            min_ratio_samples: 10,
            ratio_slack: 0.8,
            single_step_drop: 0.30,
            low_value_cutoff: 5.0,
            low_value_reference: 3.0,
            ratio_reference: 2.0,
            step_reference: 1.0,
        }
    }
}

/// Kalman strategy tunables. The Kalman strategy carries its own motion
/// heuristics, distinct from the orchestrator gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanSettings {
    /// Process noise (state drift per step)
    pub process_noise: f64,

    /// Measurement noise (sensor variance)
    pub measurement_noise: f64,

    /// Fractional drop vs the previous value that invalidates a measurement
    pub drop_threshold: f64,

    /// Reference level above which an implausibly low raw reading is
    /// rejected
    pub motion_threshold: f64,
}

impl Default for KalmanSettings {
    fn default() -> Self {
        Self {
            process_noise: 0.1,
            measurement_noise: 4.0,
            drop_threshold: 0.5,
            motion_threshold: 0.8,
        }
    }
}

/// Windowed contextual strategy tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextualSettings {
    /// Half-window size in samples (±window around the candidate)
    pub analysis_window_size: usize,

    /// Minimum valid neighbors required for a window verdict
    pub min_valid_points_in_window: usize,

    /// Base fractional drop threshold before adaptive scaling
    pub drop_threshold: f64,

    /// Use cross-field correlation with the reference when computing
    /// replacements
    pub multi_field_correlation: bool,

    /// Scale detection thresholds by workout phase and intensity
    pub adaptive_thresholds: bool,

    /// Pull replacements toward the immediate temporal neighbors
    pub temporal_smoothing: bool,

    /// Classify workout phase and intensity per candidate point
    pub contextual_awareness: bool,

    /// |correlation| above which the reference projection contributes to
    /// the replacement value
    pub correlation_weight_threshold: f64,

    /// Upper bound on the temporal-smoothing weight
    pub smoothing_cap: f64,
}

impl Default for ContextualSettings {
    fn default() -> Self {
        Self {
            analysis_window_size: 10,
            min_valid_points_in_window: 3,
            drop_threshold: 0.5,
            multi_field_correlation: true,
            adaptive_thresholds: true,
            temporal_smoothing: true,
            contextual_awareness: true,
            correlation_weight_threshold: 0.3,
            smoothing_cap: 0.4,
        }
    }
}
