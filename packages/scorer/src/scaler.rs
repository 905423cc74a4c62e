//! Median/IQR feature scaling.

use crate::features::FeatureMatrix;

/// Centers each feature on its median and divides by its interquartile
/// range. Heavy-tailed KPI columns keep their outliers without those
/// outliers dominating the scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustScaler {
    centers: Vec<f64>,
    scales: Vec<f64>,
}

impl RobustScaler {
    /// Learns per-column median and IQR from `x`.
    ///
    /// A column with zero (or undefined) spread gets a scale of 1 so it is
    /// only centered.
    #[must_use]
    pub fn fit(x: &FeatureMatrix) -> Self {
        let (centers, scales) = (0..x.n_cols())
            .map(|j| {
                let column = x.column(j);
                let center = tile_anomaly_stats::median(&column).unwrap_or(0.0);
                let scale = tile_anomaly_stats::interquartile_range(&column)
                    .filter(|iqr| *iqr > 0.0 && iqr.is_finite())
                    .unwrap_or(1.0);
                (center, scale)
            })
            .unzip();

        Self { centers, scales }
    }

    #[must_use]
    pub fn transform(&self, x: &FeatureMatrix) -> FeatureMatrix {
        x.map(|j, v| (v - self.centers[j]) / self.scales[j])
    }

    #[must_use]
    pub fn fit_transform(x: &FeatureMatrix) -> (Self, FeatureMatrix) {
        let scaler = Self::fit(x);
        let scaled = scaler.transform(x);
        (scaler, scaled)
    }

    #[must_use]
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    #[must_use]
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_by_median_and_iqr() {
        let x = FeatureMatrix::from_rows(1, &[[1.0], [2.0], [3.0], [4.0], [5.0]]);
        let (scaler, scaled) = RobustScaler::fit_transform(&x);

        assert!((scaler.centers()[0] - 3.0).abs() < 1e-12);
        assert!((scaler.scales()[0] - 2.0).abs() < 1e-12);
        assert_eq!(scaled.column(0), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn constant_column_is_only_centered() {
        let x = FeatureMatrix::from_rows(2, &[[7.0, 1.0], [7.0, 2.0], [7.0, 3.0]]);
        let (scaler, scaled) = RobustScaler::fit_transform(&x);

        assert!((scaler.scales()[0] - 1.0).abs() < f64::EPSILON);
        assert_eq!(scaled.column(0), vec![0.0, 0.0, 0.0]);
        assert!(scaled.column(1).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn outlier_does_not_move_the_center() {
        let x = FeatureMatrix::from_rows(1, &[[10.0], [11.0], [12.0], [13.0], [10_000.0]]);
        let scaler = RobustScaler::fit(&x);
        assert!((scaler.centers()[0] - 12.0).abs() < 1e-12);
    }
}
