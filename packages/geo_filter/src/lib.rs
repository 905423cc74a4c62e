#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geo filter: the first pipeline stage.
//!
//! Parses each tile's WKT polygon, derives its area-weighted centroid, and
//! keeps the tiles whose centroid falls inside a bounding box (all edges
//! inclusive). Rows with unparseable or non-polygonal geometry are dropped
//! with a warning and counted in the [`FilterSummary`]; they are never
//! passed through.

use std::path::Path;
use std::sync::Arc;

use geo::{Centroid, Geometry};
use tile_anomaly_io::DatasetError;
use tile_anomaly_io::progress::ProgressCallback;
use tile_anomaly_tile_models::{BoundingBox, LocatedTile, TileRecord};
use wkt::TryFromWkt;

/// Number of rows between progress updates.
const PROGRESS_CHUNK: usize = 10_000;

/// Errors that can occur during geo filtering.
#[derive(Debug, thiserror::Error)]
pub enum GeoFilterError {
    /// Reading the input or writing the snapshot failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The tile's WKT could not be parsed.
    #[error("Failed to parse geometry for tile {quadkey}: {message}")]
    GeometryParse {
        /// Tile identifier.
        quadkey: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The WKT parsed but is not a polygon, or has no centroid.
    #[error("Tile {quadkey} has unusable geometry: {message}")]
    UnsupportedGeometry {
        /// Tile identifier.
        quadkey: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Row counts for one filter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    /// Tiles considered (after the null-KPI filter).
    pub read: usize,
    /// Tiles dropped because their geometry was unusable.
    pub malformed: usize,
    /// Tiles whose centroid fell outside the box.
    pub outside: usize,
    /// Tiles kept.
    pub kept: usize,
}

/// Returns the centroid `(lon, lat)` of the tile's polygon.
///
/// # Errors
///
/// Returns [`GeoFilterError::GeometryParse`] for malformed WKT and
/// [`GeoFilterError::UnsupportedGeometry`] for non-polygon or empty
/// geometries.
pub fn tile_centroid(tile: &TileRecord) -> Result<(f64, f64), GeoFilterError> {
    let geometry = Geometry::<f64>::try_from_wkt_str(&tile.tile).map_err(|e| {
        GeoFilterError::GeometryParse {
            quadkey: tile.quadkey.clone(),
            message: e.to_string(),
        }
    })?;

    let centroid = match geometry {
        Geometry::Polygon(polygon) => polygon.centroid(),
        Geometry::MultiPolygon(multi) => multi.centroid(),
        _ => {
            return Err(GeoFilterError::UnsupportedGeometry {
                quadkey: tile.quadkey.clone(),
                message: "expected POLYGON or MULTIPOLYGON".to_string(),
            });
        }
    };

    let point = centroid.ok_or_else(|| GeoFilterError::UnsupportedGeometry {
        quadkey: tile.quadkey.clone(),
        message: "empty polygon".to_string(),
    })?;

    Ok((point.x(), point.y()))
}

/// Locates every tile and keeps those inside `bbox`.
///
/// Input order is preserved.
#[must_use]
pub fn filter_tiles(
    tiles: Vec<TileRecord>,
    bbox: &BoundingBox,
    progress: &Arc<dyn ProgressCallback>,
) -> (Vec<LocatedTile>, FilterSummary) {
    let mut summary = FilterSummary {
        read: tiles.len(),
        ..FilterSummary::default()
    };
    progress.set_total(tiles.len() as u64);

    let mut kept = Vec::new();
    let mut reported = 0;
    for (i, tile) in tiles.into_iter().enumerate() {
        if i > 0 && i % PROGRESS_CHUNK == 0 {
            progress.inc(PROGRESS_CHUNK as u64);
            reported += PROGRESS_CHUNK;
        }

        let (lon, lat) = match tile_centroid(&tile) {
            Ok(point) => point,
            Err(e) => {
                log::warn!("Dropping row: {e}");
                summary.malformed += 1;
                continue;
            }
        };

        if bbox.contains(lon, lat) {
            kept.push(LocatedTile {
                record: tile,
                lon,
                lat,
            });
        } else {
            summary.outside += 1;
        }
    }

    summary.kept = kept.len();
    progress.inc((summary.read - reported) as u64);
    progress.finish(format!("Located {} tiles", summary.read));
    (kept, summary)
}

/// Runs the stage: reads `input`, filters to `bbox`, writes `output`.
///
/// # Errors
///
/// Returns [`GeoFilterError::Dataset`] if reading or writing fails.
/// Malformed rows do not fail the run.
pub fn run(
    input: &Path,
    output: &Path,
    bbox: &BoundingBox,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<FilterSummary, GeoFilterError> {
    log::info!("Filtering {} to bbox {bbox}", input.display());
    let tiles = tile_anomaly_io::tiles::read_raw_tiles(input)?;

    let (located, summary) = filter_tiles(tiles, bbox, progress);
    if summary.malformed > 0 {
        log::warn!(
            "Dropped {} tiles with malformed geometry",
            summary.malformed
        );
    }

    tile_anomaly_io::tiles::write_located_tiles(output, &located)?;
    log::info!(
        "Kept {} of {} tiles ({} outside bbox, {} malformed)",
        summary.kept,
        summary.read,
        summary.outside,
        summary.malformed,
    );

    Ok(summary)
}
