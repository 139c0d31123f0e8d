//! Zone distribution engine
//!
//! Buckets session time into configured intensity bands. Zone tables are
//! supplied as static configuration (an athlete's bands are not computed
//! here) and are expected to be disjoint: a value matching multiple
//! overlapping zones increments time in *every* matching zone, so
//! percentages only add up for disjoint tables. That behavior is a
//! documented invariant callers must satisfy, not something this engine
//! silently repairs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::fields::{self, FieldKey};
use crate::models::{Record, Zone, ZoneDistributionItem};

/// Compute time-in-zone and percentage-of-session for each zone.
///
/// Walks the series once. Each point contributes the time delta to its
/// predecessor (the first point contributes nothing), attributed to every
/// zone whose `[min, max]` range contains the point's value, inclusive on
/// both ends. Points with a missing value or timestamp are skipped for
/// attribution but never discarded.
///
/// Percentage is duration / total-session-duration × 100, where the total
/// is last time − first time; distributions over non-exhaustive zone tables
/// will not sum to 100%.
///
/// A series with fewer than 2 timestamped points has no defined durations
/// and yields all-zero items, still aligned to the zone table's order.
pub fn zone_distribution(
    records: &[Record],
    field: FieldKey,
    zones: &[Zone],
) -> Vec<ZoneDistributionItem> {
    let mut durations = vec![0.0_f64; zones.len()];

    let timestamps: Vec<Option<f64>> = records
        .iter()
        .map(|record| fields::get(record, FieldKey::Time))
        .collect();
    let first_time = timestamps.iter().flatten().next().copied();
    let last_time = timestamps.iter().flatten().last().copied();

    let total_duration = match (first_time, last_time) {
        (Some(first), Some(last)) if last > first => last - first,
        _ => {
            return zones
                .iter()
                .map(|zone| ZoneDistributionItem {
                    zone: zone.clone(),
                    duration: 0.0,
                    percentage: 0.0,
                })
                .collect();
        }
    };

    let mut previous_time: Option<f64> = None;
    for (record, time) in records.iter().zip(timestamps.iter()) {
        let time = match time {
            Some(time) => *time,
            None => continue,
        };
        let delta = match previous_time {
            Some(previous) => (time - previous).max(0.0),
            None => 0.0,
        };
        previous_time = Some(time);

        if delta == 0.0 {
            continue;
        }
        let value = match fields::get(record, field) {
            Some(value) => value,
            None => continue,
        };
        for (zone, duration) in zones.iter().zip(durations.iter_mut()) {
            if zone.contains(value) {
                *duration += delta;
            }
        }
    }

    zones
        .iter()
        .zip(durations)
        .map(|(zone, duration)| ZoneDistributionItem {
            zone: zone.clone(),
            duration,
            percentage: duration / total_duration * 100.0,
        })
        .collect()
}

/// A named zone table, loadable from TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneTable {
    /// Optional label for display ("Watt zones", "Stroke rate zones")
    #[serde(default)]
    pub name: Option<String>,

    /// Ordered zone list; output items follow this order
    pub zones: Vec<Zone>,
}

impl ZoneTable {
    /// Load a zone table from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read zone table: {}", path.as_ref().display())
        })?;
        let table: ZoneTable =
            toml::from_str(&content).with_context(|| "Failed to parse TOML zone table")?;
        if table.zones.is_empty() {
            anyhow::bail!("Zone table has no zones");
        }
        Ok(table)
    }

    /// Warn-level check for the disjointness invariant
    pub fn is_disjoint(&self) -> bool {
        for (i, a) in self.zones.iter().enumerate() {
            for b in self.zones.iter().skip(i + 1) {
                if a.min <= b.max && b.min <= a.max {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record_from_pairs;

    fn series(times: &[f64], values: &[f64]) -> Vec<Record> {
        times
            .iter()
            .zip(values.iter())
            .map(|(t, v)| record_from_pairs(&[("timestamp", *t), ("watt", *v)]))
            .collect()
    }

    fn two_zone_table() -> Vec<Zone> {
        vec![Zone::new(0.0, 50.0, "A"), Zone::new(51.0, 100.0, "B")]
    }

    #[test]
    fn test_distribution_attributes_deltas_to_current_point() {
        let records = series(&[0.0, 10.0, 20.0, 30.0], &[30.0, 30.0, 70.0, 70.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &two_zone_table());

        assert_eq!(items[0].duration, 10.0);
        assert_eq!(items[1].duration, 20.0);
        assert!((items[0].percentage - 100.0 / 3.0).abs() < 1e-9);
        assert!((items[1].percentage - 200.0 / 3.0).abs() < 1e-9);
        let total: f64 = items.iter().map(|item| item.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_aligned_to_table_order() {
        let records = series(&[0.0, 10.0], &[70.0, 70.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &two_zone_table());
        assert_eq!(items[0].zone.name, "A");
        assert_eq!(items[1].zone.name, "B");
        assert_eq!(items[0].duration, 0.0);
        assert_eq!(items[1].duration, 10.0);
    }

    #[test]
    fn test_single_point_series_yields_zeroes() {
        let records = series(&[0.0], &[42.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &two_zone_table());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.duration == 0.0));
        assert!(items.iter().all(|item| item.percentage == 0.0));

        let empty: Vec<Record> = Vec::new();
        let items = zone_distribution(&empty, FieldKey::Watt, &two_zone_table());
        assert!(items.iter().all(|item| item.duration == 0.0));
    }

    #[test]
    fn test_gap_in_table_loses_time() {
        // Value 50.5 falls between the two zones: its delta is attributed
        // nowhere and percentages no longer sum to 100
        let records = series(&[0.0, 10.0, 20.0], &[30.0, 50.5, 70.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &two_zone_table());
        let total: f64 = items.iter().map(|item| item.percentage).sum();
        assert!(total < 100.0 - 1e-9);
    }

    #[test]
    fn test_overlapping_zones_count_twice() {
        let zones = vec![Zone::new(0.0, 100.0, "wide"), Zone::new(40.0, 60.0, "narrow")];
        let records = series(&[0.0, 10.0], &[50.0, 50.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &zones);

        // The same delta lands in both matching zones
        assert_eq!(items[0].duration, 10.0);
        assert_eq!(items[1].duration, 10.0);
    }

    #[test]
    fn test_missing_values_skipped_not_discarded() {
        let mut records = series(&[0.0, 10.0, 20.0], &[30.0, 30.0, 30.0]);
        records[1].remove("watt");
        let items = zone_distribution(&records, FieldKey::Watt, &two_zone_table());
        // Delta at the missing point is lost; the later delta still counts
        assert_eq!(items[0].duration, 10.0);
    }

    #[test]
    fn test_open_ended_top_zone() {
        let zones = vec![Zone::new(0.0, 149.9, "easy"), Zone::new(150.0, f64::INFINITY, "hard")];
        let records = series(&[0.0, 10.0, 20.0], &[100.0, 400.0, 400.0]);
        let items = zone_distribution(&records, FieldKey::Watt, &zones);
        assert_eq!(items[1].duration, 20.0);
    }

    #[test]
    fn test_zone_table_disjoint_check() {
        let table = ZoneTable {
            name: None,
            zones: two_zone_table(),
        };
        assert!(table.is_disjoint());

        let overlapping = ZoneTable {
            name: None,
            zones: vec![Zone::new(0.0, 60.0, "a"), Zone::new(50.0, 100.0, "b")],
        };
        assert!(!overlapping.is_disjoint());
    }
}
