use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single telemetry sample as produced by the upstream device decoder.
///
/// Records are deliberately duck-typed: upstream sources disagree on field
/// spellings ("stroke rate" vs "stroke_rate") and attach arbitrary extra
/// fields, so each record is a flat name→value map rather than a fixed
/// struct. Use [`crate::fields`] to read and write logical fields.
///
/// Required keys by convention: a monotonic `timestamp` (seconds elapsed
/// since session start) and a reference motion field (`enhanced_speed`).
pub type Record = Map<String, Value>;

/// An ordered session of records. Index is temporal order; no reordering
/// ever occurs.
pub type RecordSeries = Vec<Record>;

/// Build a record from (key, value) pairs. Mostly useful in tests and
/// importers.
pub fn record_from_pairs(pairs: &[(&str, f64)]) -> Record {
    let mut record = Map::new();
    for (key, value) in pairs {
        if let Some(number) = serde_json::Number::from_f64(*value) {
            record.insert((*key).to_string(), Value::Number(number));
        }
    }
    record
}

/// A labeled intensity band. `max` may be `f64::INFINITY` for an open-ended
/// top zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Lower bound, inclusive
    pub min: f64,

    /// Upper bound, inclusive
    #[serde(default = "zone_max_default")]
    pub max: f64,

    /// Human-readable zone label
    pub name: String,
}

fn zone_max_default() -> f64 {
    f64::INFINITY
}

impl Zone {
    pub fn new(min: f64, max: f64, name: impl Into<String>) -> Self {
        Self {
            min,
            max,
            name: name.into(),
        }
    }

    /// Whether a value falls inside this zone, inclusive on both ends.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Time spent in one zone plus its share of the full session duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDistributionItem {
    pub zone: Zone,

    /// Seconds attributed to this zone
    pub duration: f64,

    /// duration / total-session-duration × 100. Distributions over
    /// non-exhaustive zone tables will not sum to 100%.
    pub percentage: f64,
}

/// Coarse classification of a point's position within a session, used to
/// adapt correction aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutPhase {
    Warmup,
    Main,
    Interval,
    Recovery,
    Cooldown,
}

impl WorkoutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutPhase::Warmup => "warmup",
            WorkoutPhase::Main => "main",
            WorkoutPhase::Interval => "interval",
            WorkoutPhase::Recovery => "recovery",
            WorkoutPhase::Cooldown => "cooldown",
        }
    }
}

/// Intensity tier derived from the local reference (speed) level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityTier {
    Low,
    Medium,
    High,
}

/// Direction of a local series trend, via the slope-significance test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Aggregate statistics for one correction run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionStats {
    /// Number of records in the session
    pub total_points: usize,

    /// Number of points flagged noisy on at least one field
    pub noisy_points: usize,

    /// Fix count per logical field (canonical name)
    pub fixed_fields: HashMap<String, usize>,

    /// 100 × (1 − noisy_points/total_points)
    pub quality_score: f64,

    /// Fix count per workout phase; only populated by the contextual
    /// strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_analysis: Option<HashMap<WorkoutPhase, usize>>,
}

impl CorrectionStats {
    /// Compute the quality score from the accumulated counts.
    pub fn finalize(&mut self) {
        self.quality_score = if self.total_points == 0 {
            100.0
        } else {
            100.0 * (1.0 - self.noisy_points as f64 / self.total_points as f64)
        };
    }

    /// Total fixes across all fields
    pub fn total_fixes(&self) -> usize {
        self.fixed_fields.values().sum()
    }
}

/// Result of one `correct()` call: the corrected working set plus run
/// statistics. The caller's original series is left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub records: RecordSeries,
    pub stats: CorrectionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_contains_inclusive_bounds() {
        let zone = Zone::new(50.0, 100.0, "B");
        assert!(zone.contains(50.0));
        assert!(zone.contains(100.0));
        assert!(zone.contains(75.0));
        assert!(!zone.contains(49.9));
        assert!(!zone.contains(100.1));
    }

    #[test]
    fn test_zone_open_ended() {
        let zone = Zone::new(150.0, f64::INFINITY, "Z5");
        assert!(zone.contains(10_000.0));
        assert!(!zone.contains(149.0));
    }

    #[test]
    fn test_zone_deserialize_missing_max() {
        let zone: Zone = serde_json::from_str(r#"{"min": 150.0, "name": "Z5"}"#).unwrap();
        assert_eq!(zone.max, f64::INFINITY);
    }

    #[test]
    fn test_stats_quality_score() {
        let mut stats = CorrectionStats {
            total_points: 200,
            noisy_points: 10,
            ..Default::default()
        };
        stats.finalize();
        assert!((stats.quality_score - 95.0).abs() < 1e-9);

        let mut empty = CorrectionStats::default();
        empty.finalize();
        assert_eq!(empty.quality_score, 100.0);
    }

    #[test]
    fn test_record_from_pairs() {
        let record = record_from_pairs(&[("timestamp", 0.0), ("watt", 180.0)]);
        assert_eq!(record.get("watt").and_then(|v| v.as_f64()), Some(180.0));
    }
}
