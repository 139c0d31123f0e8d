//! Statistical primitives for the correction engine
//!
//! Pure functions over numeric slices. Non-finite values are filtered out
//! before aggregation. Empty input yields 0.0 sentinels rather than errors:
//! these functions sit in the hot loop of every strategy and boundary
//! windows routinely come up empty. Top-level statistics calls that need a
//! hard failure should check sample sizes themselves and surface
//! `CalculationError::InsufficientData`.

use crate::models::TrendDirection;

/// Relative trend strength (percent of mean per step) above which a series
/// counts as trending rather than stable.
pub const TREND_STRENGTH_THRESHOLD: f64 = 5.0;

/// Arithmetic mean of the finite values. 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Median of the finite values. 0.0 for empty input.
pub fn median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    }
}

/// Population variance of the finite values. 0.0 for fewer than 2 samples.
pub fn variance(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return 0.0;
    }
    let mu = finite.iter().sum::<f64>() / finite.len() as f64;
    finite.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / finite.len() as f64
}

/// Population standard deviation. 0.0 for fewer than 2 samples.
pub fn stddev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Pearson product-moment correlation coefficient.
///
/// Requires equal-length input with at least 3 points; shorter or mismatched
/// input and zero-variance series yield 0.0 (a degenerate denominator is a
/// routine boundary condition, not an error). Result is clamped to [-1, 1]
/// against floating-point drift.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 3 {
        return 0.0;
    }

    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 3 {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Least-squares slope of the finite values against their index.
/// 0.0 for fewer than 2 samples.
pub fn linear_trend_slope(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = finite.iter().sum::<f64>() / n_f;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in finite.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Classify a series as trending up, down, or stable.
///
/// Trend strength is |slope|/mean × 100 (percent of the series mean per
/// step); only strengths above [`TREND_STRENGTH_THRESHOLD`] count as a real
/// trend.
pub fn trend_direction(values: &[f64]) -> TrendDirection {
    let mu = mean(values);
    if mu == 0.0 {
        return TrendDirection::Stable;
    }
    let slope = linear_trend_slope(values);
    let strength = (slope / mu).abs() * 100.0;
    if strength <= TREND_STRENGTH_THRESHOLD {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_filters_non_finite() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[f64::NAN]), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_stddev() {
        // Population stddev of [2,4,4,4,5,5,7,9] is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev(&values) - 2.0).abs() < 1e-12);
        assert_eq!(stddev(&[5.0]), 0.0);
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson_correlation(&xs, &ys) - 1.0).abs() < 1e-12);

        let inverse = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&xs, &inverse) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        // Too short
        assert_eq!(pearson_correlation(&[1.0, 2.0], &[3.0, 4.0]), 0.0);
        // Mismatched lengths
        assert_eq!(pearson_correlation(&[1.0, 2.0, 3.0], &[1.0, 2.0]), 0.0);
        // Zero variance
        assert_eq!(pearson_correlation(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_pearson_symmetry() {
        let xs = [1.0, 3.0, 2.0, 5.0, 4.0];
        let ys = [2.0, 1.0, 4.0, 3.0, 6.0];
        assert_eq!(pearson_correlation(&xs, &ys), pearson_correlation(&ys, &xs));
    }

    #[test]
    fn test_linear_trend_slope() {
        assert!((linear_trend_slope(&[0.0, 1.0, 2.0, 3.0]) - 1.0).abs() < 1e-12);
        assert!((linear_trend_slope(&[10.0, 8.0, 6.0, 4.0]) + 2.0).abs() < 1e-12);
        assert_eq!(linear_trend_slope(&[7.0]), 0.0);
    }

    #[test]
    fn test_trend_direction() {
        // Slope 1 over mean 1.5: strength 66% → Up
        assert_eq!(trend_direction(&[0.0, 1.0, 2.0, 3.0]), TrendDirection::Up);
        assert_eq!(
            trend_direction(&[30.0, 28.0, 26.0, 24.0]),
            TrendDirection::Down
        );
        // Slope ~0.1 over mean 20: strength 0.5% → Stable
        assert_eq!(
            trend_direction(&[20.0, 20.1, 19.9, 20.2, 20.0]),
            TrendDirection::Stable
        );
        assert_eq!(trend_direction(&[]), TrendDirection::Stable);
    }
}
