use fitscrub::config::CorrectionSettings;
use fitscrub::correction::{correct, CorrectionMethod};
use fitscrub::error::{ComparisonError, FitScrubError};
use fitscrub::fields::{self, FieldKey};
use fitscrub::metrics::calculate_filter_improvement_metrics;
use fitscrub::models::{record_from_pairs, Record, Zone};
use fitscrub::stats::pearson_correlation;
use fitscrub::zones::zone_distribution;

/// Integration tests exercising the complete correction and analysis
/// pipeline end to end

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

fn settings_for(method: CorrectionMethod) -> CorrectionSettings {
    CorrectionSettings {
        method,
        ..Default::default()
    }
}

const ALL_METHODS: [CorrectionMethod; 6] = [
    CorrectionMethod::Threshold,
    CorrectionMethod::MovingAverage,
    CorrectionMethod::Correlation,
    CorrectionMethod::Kalman,
    CorrectionMethod::Contextual,
    CorrectionMethod::Auto,
];

#[test]
fn flat_watt_dropout_is_interpolated_between_equal_neighbors() {
    // A single implausible sag while speed holds perfectly steady
    let records = session(&[5.0, 5.0, 5.0, 5.0, 5.0], &[100.0, 100.0, 5.0, 100.0, 100.0]);
    let outcome = correct(&records, &settings_for(CorrectionMethod::Correlation));

    assert_eq!(
        fields::get(&outcome.records[2], FieldKey::Watt),
        Some(100.0)
    );
    for (i, record) in outcome.records.iter().enumerate() {
        assert_eq!(
            record.get("watt_corrected").and_then(|v| v.as_bool()),
            if i == 2 { Some(true) } else { None },
            "only index 2 should carry the corrected flag"
        );
    }
    assert_eq!(
        outcome.records[2]
            .get("watt_original")
            .and_then(|v| v.as_f64()),
        Some(5.0)
    );
}

#[test]
fn stationary_session_is_never_corrected() {
    // Reference shows no motion: low target readings are plausibly real
    let records = session(&[0.0, 0.0, 0.0], &[0.0, 0.0, 0.0]);

    for method in ALL_METHODS {
        let outcome = correct(&records, &settings_for(method));
        assert_eq!(outcome.records, records, "method {}", method);
        assert_eq!(outcome.stats.noisy_points, 0, "method {}", method);
        assert_eq!(outcome.stats.quality_score, 100.0, "method {}", method);
    }
}

#[test]
fn stable_session_returns_unchanged_for_every_strategy() {
    let speed = vec![4.0; 30];
    let watt: Vec<f64> = (0..30).map(|i| 200.0 + (i % 2) as f64).collect();
    let records = session(&speed, &watt);

    for method in ALL_METHODS {
        let outcome = correct(&records, &settings_for(method));
        for record in &outcome.records {
            assert!(
                !record.contains_key("watt_corrected"),
                "method {} added a corrected flag to a stable series",
                method
            );
            assert!(!record.contains_key("watt_original"), "method {}", method);
        }
        assert_eq!(outcome.stats.noisy_points, 0, "method {}", method);
    }
}

#[test]
fn length_and_order_preserved_for_every_strategy() {
    let speed: Vec<f64> = (0..50).map(|i| 3.5 + 0.02 * (i % 5) as f64).collect();
    let mut watt: Vec<f64> = (0..50).map(|i| 180.0 + (i % 7) as f64).collect();
    watt[10] = 0.0;
    watt[11] = 0.0;
    watt[30] = 3.0;
    let records = session(&speed, &watt);

    for method in ALL_METHODS {
        let outcome = correct(&records, &settings_for(method));
        assert_eq!(outcome.records.len(), records.len(), "method {}", method);
        for (i, record) in outcome.records.iter().enumerate() {
            assert_eq!(
                fields::get(record, FieldKey::Time),
                Some(i as f64),
                "method {} reordered records",
                method
            );
        }
    }
}

#[test]
fn threshold_and_correlation_respect_the_configured_floor() {
    let speed = vec![4.0; 20];
    let mut watt = vec![40.0; 20];
    watt[8] = 0.0;
    watt[9] = 1.0;
    watt[15] = 2.0;
    let records = session(&speed, &watt);

    for method in [CorrectionMethod::Threshold, CorrectionMethod::Correlation] {
        let settings = settings_for(method);
        let outcome = correct(&records, &settings);
        for (i, record) in outcome.records.iter().enumerate() {
            if fields::is_corrected(record, FieldKey::Watt) {
                let value = fields::get(record, FieldKey::Watt).unwrap();
                assert!(
                    value >= settings.min_valid_watt,
                    "method {} index {} produced {} below the floor",
                    method,
                    i,
                    value
                );
            }
        }
    }
}

#[test]
fn zone_partition_percentages_sum_to_one_hundred() {
    let zones = vec![
        Zone::new(0.0, 50.0, "A"),
        Zone::new(51.0, 100.0, "B"),
    ];
    let records: Vec<Record> = [(0.0, 30.0), (10.0, 30.0), (20.0, 70.0), (30.0, 70.0)]
        .iter()
        .map(|(t, v)| record_from_pairs(&[("timestamp", *t), ("watt", *v)]))
        .collect();

    let items = zone_distribution(&records, FieldKey::Watt, &zones);
    assert_eq!(items[0].duration, 10.0);
    assert_eq!(items[1].duration, 20.0);
    assert!((items[0].percentage - 33.333333).abs() < 1e-4);
    assert!((items[1].percentage - 66.666666).abs() < 1e-4);

    let total: f64 = items.iter().map(|item| item.percentage).sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn comparison_length_mismatch_is_an_error_value() {
    let original = session(&vec![4.0; 10], &vec![100.0; 10]);
    let corrected = session(&vec![4.0; 9], &vec![100.0; 9]);

    let result =
        calculate_filter_improvement_metrics(&original, &corrected, &[FieldKey::Watt]);
    match result {
        Err(FitScrubError::Comparison(ComparisonError::LengthMismatch {
            original_length,
            filtered_length,
        })) => {
            assert_eq!(original_length, 10);
            assert_eq!(filtered_length, 9);
        }
        other => panic!("expected length mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn kalman_coasts_through_a_silent_sensor() {
    // One valid reading, then nothing but motion: the filter must carry
    // its estimate to the end without panicking
    let mut records = vec![record_from_pairs(&[
        ("timestamp", 0.0),
        ("enhanced_speed", 4.0),
        ("watt", 220.0),
    ])];
    for i in 1..20 {
        records.push(record_from_pairs(&[
            ("timestamp", i as f64),
            ("enhanced_speed", 4.0),
        ]));
    }

    let outcome = correct(&records, &settings_for(CorrectionMethod::Kalman));
    for (i, record) in outcome.records.iter().enumerate() {
        let filtered = record.get("watt_filtered").and_then(|v| v.as_f64());
        assert_eq!(filtered, Some(220.0), "index {}", i);
    }
    assert_eq!(outcome.stats.noisy_points, 19);
}

#[test]
fn correction_pipeline_improves_dropout_metrics() {
    let speed = vec![4.2; 40];
    let mut watt = vec![210.0; 40];
    for index in [7, 8, 21, 33] {
        watt[index] = 0.0;
    }
    let original = session(&speed, &watt);

    let outcome = correct(&original, &CorrectionSettings::default());
    let report =
        calculate_filter_improvement_metrics(&original, &outcome.records, &[FieldKey::Watt])
            .unwrap();

    let watt_report = &report.fields[0];
    assert_eq!(watt_report.dropouts_before, 4);
    assert_eq!(watt_report.dropouts_after, 0);
    assert_eq!(watt_report.dropout_reduction_percent, 100.0);
    assert_eq!(watt_report.corrected_points, 4);
    assert!(watt_report.mean_after > watt_report.mean_before);
}

#[test]
fn corrections_are_visible_to_later_points_in_the_same_pass() {
    // After the dropout at index 2 is fixed, index 3 is judged against the
    // repaired value, not the raw sag, so it is not treated as a recovery
    // spike or a follow-on drop
    let records = session(
        &[4.0, 4.0, 4.0, 4.0, 4.0, 4.0],
        &[200.0, 200.0, 0.0, 198.0, 201.0, 200.0],
    );
    let outcome = correct(&records, &settings_for(CorrectionMethod::Correlation));

    assert!(fields::is_corrected(&outcome.records[2], FieldKey::Watt));
    assert!(!fields::is_corrected(&outcome.records[3], FieldKey::Watt));
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pearson_is_symmetric_and_bounded(
            pairs in prop::collection::vec((0.0f64..500.0, 0.0f64..500.0), 3..60)
        ) {
            let xs: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
            let ys: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();

            let forward = pearson_correlation(&xs, &ys);
            let backward = pearson_correlation(&ys, &xs);
            prop_assert!((forward - backward).abs() < 1e-12);
            prop_assert!((-1.0..=1.0).contains(&forward));
        }

        #[test]
        fn correction_preserves_length_for_arbitrary_sessions(
            watt in prop::collection::vec(0.0f64..600.0, 2..120),
            method_index in 0usize..6
        ) {
            let speed = vec![4.0; watt.len()];
            let records = session(&speed, &watt);
            let method = ALL_METHODS[method_index];

            let outcome = correct(&records, &settings_for(method));
            prop_assert_eq!(outcome.records.len(), records.len());
        }

        #[test]
        fn quality_score_stays_in_range(
            watt in prop::collection::vec(0.0f64..600.0, 2..80)
        ) {
            let speed = vec![4.0; watt.len()];
            let records = session(&speed, &watt);
            let outcome = correct(&records, &CorrectionSettings::default());

            prop_assert!((0.0..=100.0).contains(&outcome.stats.quality_score));
            prop_assert!(outcome.stats.noisy_points <= outcome.stats.total_points);
        }
    }
}
