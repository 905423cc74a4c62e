//! Feature extraction and missing-value handling.
//!
//! The model sees five KPI columns per tile. A missing value must be dealt
//! with before fitting: it either removes the row from the batch or is
//! replaced by the column median, depending on [`NullPolicy`].

use tile_anomaly_config::NullPolicy;
use tile_anomaly_tile_models::{
    COL_AVG_D_KBPS, COL_AVG_LAT_MS, COL_AVG_U_KBPS, COL_DEVICES, COL_TESTS, LocatedTile,
    TileRecord,
};

use crate::ScoreError;

/// Model input columns, in matrix column order.
pub const FEATURES: [&str; 5] = [
    COL_AVG_D_KBPS,
    COL_AVG_U_KBPS,
    COL_AVG_LAT_MS,
    COL_TESTS,
    COL_DEVICES,
];

/// Dense row-major matrix of finite feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    n_cols: usize,
}

impl FeatureMatrix {
    /// Creates an empty matrix with `n_cols` columns.
    #[must_use]
    pub const fn new(n_cols: usize) -> Self {
        Self {
            values: Vec::new(),
            n_cols,
        }
    }

    /// Builds a matrix from equally sized rows.
    ///
    /// # Panics
    ///
    /// Panics if a row's length differs from `n_cols`.
    #[must_use]
    pub fn from_rows<R: AsRef<[f64]>>(n_cols: usize, rows: &[R]) -> Self {
        let mut matrix = Self::new(n_cols);
        for row in rows {
            matrix.push_row(row.as_ref());
        }
        matrix
    }

    /// Appends a row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len()` differs from the column count.
    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.n_cols, "row width mismatch");
        self.values.extend_from_slice(row);
    }

    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.values.len() / self.n_cols
        }
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_cols..(i + 1) * self.n_cols]
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n_cols + j]
    }

    /// Copies column `j` out.
    #[must_use]
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.get(i, j)).collect()
    }

    /// Applies `f(column, value)` to every cell.
    #[must_use]
    pub fn map(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        let n_cols = self.n_cols;
        Self {
            values: self
                .values
                .iter()
                .enumerate()
                .map(|(idx, &v)| f(idx % n_cols, v))
                .collect(),
            n_cols,
        }
    }
}

/// Reads the model features off a tile, in [`FEATURES`] order.
///
/// Non-finite values count as missing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn feature_values(record: &TileRecord) -> [Option<f64>; 5] {
    [
        record.avg_d_kbps,
        record.avg_u_kbps,
        record.avg_lat_ms,
        record.tests.map(|v| v as f64),
        record.devices.map(|v| v as f64),
    ]
    .map(|v| v.filter(|x| x.is_finite()))
}

/// Tiles that made it into the model batch, row-aligned with their features.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub tiles: Vec<LocatedTile>,
    pub features: FeatureMatrix,
    /// Rows dropped under [`NullPolicy::Reject`].
    pub rejected: usize,
    /// Cells filled under [`NullPolicy::ImputeMedian`].
    pub imputed: usize,
}

/// Resolves missing feature values according to `policy` and builds the
/// feature matrix.
///
/// # Errors
///
/// Returns [`ScoreError::InvalidFeatureValue`] if imputation is requested
/// for a feature with no values at all, and [`ScoreError::EmptyBatch`] if no
/// rows remain.
pub fn prepare_batch(
    tiles: Vec<LocatedTile>,
    policy: NullPolicy,
) -> Result<PreparedBatch, ScoreError> {
    let raw: Vec<[Option<f64>; 5]> = tiles.iter().map(|t| feature_values(&t.record)).collect();
    let mut features = FeatureMatrix::new(FEATURES.len());

    let batch = match policy {
        NullPolicy::Reject => {
            let mut kept = Vec::with_capacity(tiles.len());
            let mut rejected = 0;

            for (tile, values) in tiles.into_iter().zip(&raw) {
                if let Some(missing) = values.iter().position(Option::is_none) {
                    let err = ScoreError::InvalidFeatureValue {
                        quadkey: tile.record.quadkey.clone(),
                        feature: FEATURES[missing],
                    };
                    log::debug!("Rejecting row: {err}");
                    rejected += 1;
                    continue;
                }
                features.push_row(&values.map(|v| v.unwrap_or_default()));
                kept.push(tile);
            }

            if rejected > 0 {
                log::warn!("Rejected {rejected} tiles with missing feature values");
            }

            PreparedBatch {
                tiles: kept,
                features,
                rejected,
                imputed: 0,
            }
        }
        NullPolicy::ImputeMedian => {
            let mut medians = [0.0; 5];
            for (j, median) in medians.iter_mut().enumerate() {
                let present: Vec<f64> = raw.iter().filter_map(|row| row[j]).collect();
                *median = tile_anomaly_stats::median(&present).ok_or_else(|| {
                    ScoreError::InvalidFeatureValue {
                        quadkey: tiles
                            .first()
                            .map_or_else(String::new, |t| t.record.quadkey.clone()),
                        feature: FEATURES[j],
                    }
                })?;
            }

            let mut imputed = 0;
            for values in &raw {
                let mut row = [0.0; 5];
                for (j, value) in values.iter().enumerate() {
                    row[j] = value.unwrap_or_else(|| {
                        imputed += 1;
                        medians[j]
                    });
                }
                features.push_row(&row);
            }

            if imputed > 0 {
                log::warn!("Imputed {imputed} missing feature values with column medians");
            }

            PreparedBatch {
                tiles,
                features,
                rejected: 0,
                imputed,
            }
        }
    };

    if batch.tiles.is_empty() {
        return Err(ScoreError::EmptyBatch);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use tile_anomaly_tile_models::TileRecord;

    use super::*;

    fn located(quadkey: &str, d: Option<f64>, tests: Option<i64>) -> LocatedTile {
        LocatedTile {
            record: TileRecord {
                quadkey: quadkey.to_string(),
                avg_d_kbps: d,
                avg_u_kbps: Some(2_000.0),
                avg_lat_ms: Some(30.0),
                tests,
                devices: Some(2),
                tile: String::new(),
            },
            lon: 0.0,
            lat: 0.0,
        }
    }

    #[test]
    fn reject_policy_drops_rows_with_missing_values() {
        let tiles = vec![
            located("a", Some(10_000.0), Some(4)),
            located("b", None, Some(4)),
            located("c", Some(30_000.0), None),
            located("d", Some(f64::NAN), Some(4)),
        ];

        let batch = prepare_batch(tiles, NullPolicy::Reject).unwrap();
        assert_eq!(batch.rejected, 3);
        assert_eq!(batch.tiles.len(), 1);
        assert_eq!(batch.features.n_rows(), 1);
        assert_eq!(batch.features.row(0), [10_000.0, 2_000.0, 30.0, 4.0, 2.0]);
    }

    #[test]
    fn impute_policy_fills_column_median() {
        let tiles = vec![
            located("a", Some(10_000.0), Some(4)),
            located("b", None, Some(6)),
            located("c", Some(30_000.0), None),
        ];

        let batch = prepare_batch(tiles, NullPolicy::ImputeMedian).unwrap();
        assert_eq!(batch.imputed, 2);
        assert_eq!(batch.tiles.len(), 3);
        assert!((batch.features.get(1, 0) - 20_000.0).abs() < 1e-9);
        assert!((batch.features.get(2, 3) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn impute_fails_when_a_feature_is_entirely_missing() {
        let tiles = vec![located("a", None, Some(4)), located("b", None, Some(6))];
        let err = prepare_batch(tiles, NullPolicy::ImputeMedian).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::InvalidFeatureValue {
                feature: "avg_d_kbps",
                ..
            }
        ));
    }

    #[test]
    fn empty_batch_is_an_error() {
        let tiles = vec![located("a", None, Some(4))];
        assert!(matches!(
            prepare_batch(tiles, NullPolicy::Reject),
            Err(ScoreError::EmptyBatch)
        ));
        assert!(matches!(
            prepare_batch(Vec::new(), NullPolicy::Reject),
            Err(ScoreError::EmptyBatch)
        ));
    }

    #[test]
    fn matrix_columns_and_map() {
        let m = FeatureMatrix::from_rows(2, &[[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]]);
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.column(1), vec![10.0, 20.0, 30.0]);
        let shifted = m.map(|j, v| if j == 0 { v - 1.0 } else { v });
        assert_eq!(shifted.row(2), [2.0, 30.0]);
    }
}
