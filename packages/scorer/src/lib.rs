#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Outlier scorer: the second pipeline stage.
//!
//! Reads the located-tile snapshot, robust-scales five KPI features, fits an
//! isolation forest on the batch, and writes every tile back out with an
//! `is_anomaly` flag and an `anomaly_score` (the negated decision value, so
//! higher means more anomalous), sorted by score descending.
//!
//! Scores are relative to the batch they were fitted on and are not
//! comparable across runs on different data.

pub mod features;
pub mod forest;
pub mod scaler;

use std::path::Path;
use std::sync::Arc;

use tile_anomaly_config::ScorerConfig;
use tile_anomaly_io::DatasetError;
use tile_anomaly_io::progress::ProgressCallback;
use tile_anomaly_tile_models::{LocatedTile, ScoredTile};

use crate::features::prepare_batch;
use crate::forest::{ForestParams, IsolationForest};
use crate::scaler::RobustScaler;

/// Rows logged after a run.
const LOG_TOP_N: usize = 20;

/// Errors that can occur while scoring.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// Reading the snapshot or writing the ranking failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// A feature value is missing and the null policy cannot resolve it.
    #[error("Tile {quadkey} has no usable value for feature {feature}")]
    InvalidFeatureValue {
        /// Tile identifier.
        quadkey: String,
        /// Feature column name.
        feature: &'static str,
    },

    /// Nothing left to fit on.
    #[error("No tiles to score")]
    EmptyBatch,

    /// A model parameter is out of range.
    #[error("Invalid scorer parameter {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },
}

/// Result of scoring one batch.
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Scored tiles, highest `anomaly_score` first.
    pub tiles: Vec<ScoredTile>,
    /// Tiles dropped for missing features.
    pub rejected: usize,
    /// Missing values filled with a median.
    pub imputed: usize,
}

impl ScoringOutcome {
    /// Number of tiles flagged as anomalous.
    #[must_use]
    pub fn flagged(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_anomaly).count()
    }
}

/// Scores a batch of located tiles.
///
/// The returned tiles carry every input column unchanged and are sorted by
/// `anomaly_score` descending; ties keep input order.
///
/// # Errors
///
/// Returns [`ScoreError`] if the batch is empty after the null policy is
/// applied or a parameter is out of range.
pub fn score_tiles(
    tiles: Vec<LocatedTile>,
    config: &ScorerConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ScoringOutcome, ScoreError> {
    let batch = prepare_batch(tiles, config.null_policy)?;
    let (_, scaled) = RobustScaler::fit_transform(&batch.features);

    let params = ForestParams {
        n_estimators: config.n_estimators,
        max_samples: config.max_samples,
        contamination: config.contamination,
        seed: config.seed,
    };
    let forest = IsolationForest::fit(&scaled, &params, progress)?;
    let decisions = forest.decision_function(&scaled);

    let mut scored: Vec<ScoredTile> = batch
        .tiles
        .into_iter()
        .zip(decisions)
        .map(|(tile, decision)| ScoredTile::new(tile, decision < 0.0, -decision))
        .collect();

    scored.sort_by(|a, b| b.anomaly_score.total_cmp(&a.anomaly_score));

    Ok(ScoringOutcome {
        tiles: scored,
        rejected: batch.rejected,
        imputed: batch.imputed,
    })
}

fn log_top(tiles: &[ScoredTile]) {
    log::info!("Top {} tiles by anomaly score:", LOG_TOP_N.min(tiles.len()));
    for tile in tiles.iter().take(LOG_TOP_N) {
        log::info!(
            "  {:<18} score={:.4} anomaly={} lon={:.5} lat={:.5}",
            tile.quadkey,
            tile.anomaly_score,
            tile.is_anomaly,
            tile.lon,
            tile.lat,
        );
    }
}

/// Runs the stage: reads `input`, scores it, writes the ranking to `output`.
///
/// # Errors
///
/// Returns [`ScoreError`] if reading, scoring, or writing fails.
pub fn run(
    input: &Path,
    output: &Path,
    config: &ScorerConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ScoringOutcome, ScoreError> {
    let tiles = tile_anomaly_io::tiles::read_located_tiles(input)?;
    log::info!(
        "Scoring {} tiles (contamination {}, {} trees, seed {}, null policy {})",
        tiles.len(),
        config.contamination,
        config.n_estimators,
        config.seed,
        config.null_policy,
    );

    let outcome = score_tiles(tiles, config, progress)?;

    #[allow(clippy::cast_precision_loss)]
    let fraction = outcome.flagged() as f64 / outcome.tiles.len() as f64;
    log::info!(
        "Flagged {} of {} tiles ({:.2}%)",
        outcome.flagged(),
        outcome.tiles.len(),
        fraction * 100.0
    );
    log_top(&outcome.tiles);

    tile_anomaly_io::scored::write_scored_csv(output, &outcome.tiles)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tile_anomaly_config::NullPolicy;
    use tile_anomaly_io::progress::null_progress;
    use tile_anomaly_io::table::CsvTable;
    use tile_anomaly_tile_models::{COL_ANOMALY_SCORE, COL_IS_ANOMALY, TileRecord};

    use super::*;

    fn tile(quadkey: String, d: f64, u: f64, lat_ms: f64, tests: i64) -> LocatedTile {
        LocatedTile {
            record: TileRecord {
                quadkey,
                avg_d_kbps: Some(d),
                avg_u_kbps: Some(u),
                avg_lat_ms: Some(lat_ms),
                tests: Some(tests),
                devices: Some(tests / 2 + 1),
                tile: String::new(),
            },
            lon: -3.7,
            lat: 40.4,
        }
    }

    fn city(n: usize, seed: u64) -> Vec<LocatedTile> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|i| {
                tile(
                    format!("q{i:05}"),
                    rng.random_range(30_000.0..60_000.0),
                    rng.random_range(5_000.0..12_000.0),
                    rng.random_range(15.0..35.0),
                    rng.random_range(5..40),
                )
            })
            .collect()
    }

    fn config(contamination: f64) -> ScorerConfig {
        ScorerConfig {
            contamination,
            n_estimators: 100,
            ..ScorerConfig::default()
        }
    }

    #[test]
    fn preserves_rows_and_sorts_descending() {
        let input = city(200, 1);
        let outcome = score_tiles(input.clone(), &config(0.05), &null_progress()).unwrap();

        assert_eq!(outcome.tiles.len(), input.len());
        assert!(
            outcome
                .tiles
                .windows(2)
                .all(|w| w[0].anomaly_score >= w[1].anomaly_score)
        );

        let mut in_keys: Vec<_> = input.iter().map(|t| t.record.quadkey.clone()).collect();
        let mut out_keys: Vec<_> = outcome.tiles.iter().map(|t| t.quadkey.clone()).collect();
        in_keys.sort();
        out_keys.sort();
        assert_eq!(in_keys, out_keys);
    }

    #[test]
    fn flagged_rows_are_the_highest_scores() {
        let outcome = score_tiles(city(300, 2), &config(0.05), &null_progress()).unwrap();
        let flagged = outcome.flagged();
        assert!(flagged > 0);
        assert!(outcome.tiles[..flagged].iter().all(|t| t.is_anomaly));
        assert!(outcome.tiles[flagged..].iter().all(|t| !t.is_anomaly));
        assert!(outcome.tiles[..flagged].iter().all(|t| t.anomaly_score > 0.0));
    }

    #[test]
    fn flagged_fraction_near_contamination() {
        let outcome = score_tiles(city(1_000, 3), &config(0.05), &null_progress()).unwrap();
        #[allow(clippy::cast_precision_loss)]
        let fraction = outcome.flagged() as f64 / 1_000.0;
        assert!((fraction - 0.05).abs() <= 0.02, "flagged {fraction}");
    }

    #[test]
    fn degraded_tile_ranks_first() {
        let mut input = city(300, 4);
        input.push(tile("broken".to_string(), 800.0, 90.0, 400.0, 1));

        let outcome = score_tiles(input, &config(0.02), &null_progress()).unwrap();
        assert_eq!(outcome.tiles[0].quadkey, "broken");
        assert!(outcome.tiles[0].is_anomaly);
    }

    #[test]
    fn score_is_negated_decision_of_the_fitted_forest() {
        let input = city(300, 8);
        let cfg = ScorerConfig {
            n_estimators: 50,
            seed: 42,
            ..config(0.05)
        };
        let outcome = score_tiles(input.clone(), &cfg, &null_progress()).unwrap();

        let batch = prepare_batch(input, cfg.null_policy).unwrap();
        let (_, scaled) = RobustScaler::fit_transform(&batch.features);
        let params = ForestParams {
            n_estimators: cfg.n_estimators,
            max_samples: cfg.max_samples,
            contamination: cfg.contamination,
            seed: cfg.seed,
        };
        let forest = IsolationForest::fit(&scaled, &params, &null_progress()).unwrap();
        let decisions = forest.decision_function(&scaled);

        assert_eq!(outcome.tiles.len(), decisions.len());
        for (tile, decision) in batch.tiles.iter().zip(&decisions) {
            let scored = outcome
                .tiles
                .iter()
                .find(|t| t.quadkey == tile.record.quadkey)
                .unwrap();
            assert!((scored.anomaly_score + decision).abs() < 1e-12);
            assert_eq!(scored.is_anomaly, *decision < 0.0);
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let a = score_tiles(city(250, 5), &config(0.05), &null_progress()).unwrap();
        let b = score_tiles(city(250, 5), &config(0.05), &null_progress()).unwrap();
        assert_eq!(a.tiles, b.tiles);
    }

    #[test]
    fn null_policy_controls_missing_rows() {
        let mut input = city(50, 6);
        input[10].record.avg_u_kbps = None;

        let rejected = score_tiles(input.clone(), &config(0.1), &null_progress()).unwrap();
        assert_eq!(rejected.tiles.len(), 49);
        assert_eq!(rejected.rejected, 1);

        let imputing = ScorerConfig {
            null_policy: NullPolicy::ImputeMedian,
            ..config(0.1)
        };
        let imputed = score_tiles(input, &imputing, &null_progress()).unwrap();
        assert_eq!(imputed.tiles.len(), 50);
        assert_eq!(imputed.imputed, 1);
        let filled = imputed.tiles.iter().find(|t| t.quadkey == "q00010").unwrap();
        assert_eq!(filled.avg_u_kbps, None);
    }

    #[test]
    fn run_writes_ranked_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("city_tiles.parquet");
        let output = dir.path().join("anomalies_ranked.csv");
        tile_anomaly_io::tiles::write_located_tiles(&input, &city(120, 7)).unwrap();

        let outcome = run(&input, &output, &config(0.05), &null_progress()).unwrap();

        let table = CsvTable::read(&output).unwrap();
        assert_eq!(table.len(), outcome.tiles.len());
        let score = table.column_index(COL_ANOMALY_SCORE).unwrap();
        assert!(table.column_index(COL_IS_ANOMALY).is_some());
        let scores: Vec<f64> = table.numeric_column(score).into_iter().flatten().collect();
        assert_eq!(scores.len(), 120);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}
