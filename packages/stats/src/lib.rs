#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Order statistics over a single batch of values.
//!
//! Quantiles use linear interpolation between the two closest ranks, which
//! is the default of most dataframe libraries. Non-finite values are
//! ignored, so a column with missing entries (stored as `NaN` or skipped
//! upstream) yields the quantile of the values that are present.

/// Returns the finite values of `values`, sorted ascending.
#[must_use]
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolated quantile of an already sorted, finite slice.
///
/// `q` is clamped to `[0, 1]`. Returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Linear-interpolated quantile of `values`, ignoring non-finite entries.
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_finite(values), q)
}

/// Median of `values`, ignoring non-finite entries.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Interquartile range (75th minus 25th percentile).
#[must_use]
pub fn interquartile_range(values: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(values);
    Some(quantile_sorted(&sorted, 0.75)? - quantile_sorted(&sorted, 0.25)?)
}

/// Several quantiles of the same batch, sorting only once.
#[must_use]
pub fn quantiles(values: &[f64], qs: &[f64]) -> Option<Vec<f64>> {
    let sorted = sorted_finite(values);
    qs.iter().map(|&q| quantile_sorted(&sorted, q)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn interpolates_between_ranks() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile(&values, 0.5).unwrap(), 2.5));
        assert!(approx(quantile(&values, 0.25).unwrap(), 1.75));
        assert!(approx(quantile(&values, 0.9).unwrap(), 3.7));
    }

    #[test]
    fn endpoints_are_min_and_max() {
        let values = [5.0, -1.0, 3.0];
        assert!(approx(quantile(&values, 0.0).unwrap(), -1.0));
        assert!(approx(quantile(&values, 1.0).unwrap(), 5.0));
    }

    #[test]
    fn ignores_nan_and_handles_empty() {
        assert!(quantile(&[], 0.5).is_none());
        assert!(quantile(&[f64::NAN], 0.5).is_none());
        assert!(approx(median(&[f64::NAN, 1.0, 3.0]).unwrap(), 2.0));
    }

    #[test]
    fn single_value_batch() {
        assert!(approx(quantile(&[7.0], 0.99).unwrap(), 7.0));
        assert!(approx(interquartile_range(&[7.0]).unwrap(), 0.0));
    }

    #[test]
    fn iqr_of_uniform_sequence() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert!(approx(interquartile_range(&values).unwrap(), 50.0));
    }

    #[test]
    fn quantiles_are_non_decreasing() {
        let values: Vec<f64> = (0..37).map(|i| f64::from(i * 7 % 11)).collect();
        let qs = quantiles(&values, &[0.90, 0.95, 0.99]).unwrap();
        assert!(qs[0] <= qs[1] && qs[1] <= qs[2]);
    }
}
