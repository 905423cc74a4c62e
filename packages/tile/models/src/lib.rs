#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Mobile network performance tile types.
//!
//! Every pipeline stage reads one of these record shapes from the previous
//! stage's output file and writes the next, richer shape. Records are never
//! updated in place once written.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Column holding the tile quadkey.
pub const COL_QUADKEY: &str = "quadkey";
/// Average downlink throughput in kbps.
pub const COL_AVG_D_KBPS: &str = "avg_d_kbps";
/// Average uplink throughput in kbps.
pub const COL_AVG_U_KBPS: &str = "avg_u_kbps";
/// Average latency in milliseconds.
pub const COL_AVG_LAT_MS: &str = "avg_lat_ms";
/// Number of speed tests aggregated into the tile.
pub const COL_TESTS: &str = "tests";
/// Number of distinct devices aggregated into the tile.
pub const COL_DEVICES: &str = "devices";
/// WKT polygon of the tile.
pub const COL_TILE: &str = "tile";
/// Centroid longitude added by the geo filter.
pub const COL_LON: &str = "lon";
/// Centroid latitude added by the geo filter.
pub const COL_LAT: &str = "lat";
/// Binary outlier flag added by the scorer.
pub const COL_IS_ANOMALY: &str = "is_anomaly";
/// Continuous outlier score added by the scorer (higher = more anomalous).
pub const COL_ANOMALY_SCORE: &str = "anomaly_score";
/// Score column produced by the period-over-period degradation scorer.
pub const COL_DEGRADATION_SCORE: &str = "degradation_score";
/// Period-over-period latency change in milliseconds.
pub const COL_D_AVG_LAT_MS: &str = "d_avg_lat_ms";
/// Period-over-period downlink change in kbps.
pub const COL_D_AVG_D_KBPS: &str = "d_avg_d_kbps";
/// Period-over-period uplink change in kbps.
pub const COL_D_AVG_U_KBPS: &str = "d_avg_u_kbps";
/// Free-text indicator column added by the labeler.
pub const COL_INDICATOR_TEXT: &str = "indicator_text";

/// A raw tile row as read from the performance dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Quadtree address of the tile.
    pub quadkey: String,
    /// Average downlink throughput in kbps.
    pub avg_d_kbps: Option<f64>,
    /// Average uplink throughput in kbps.
    pub avg_u_kbps: Option<f64>,
    /// Average latency in milliseconds.
    pub avg_lat_ms: Option<f64>,
    /// Number of tests.
    pub tests: Option<i64>,
    /// Number of devices.
    pub devices: Option<i64>,
    /// Tile polygon as WKT in EPSG:4326 (longitude, latitude order).
    pub tile: String,
}

/// A tile with its polygon centroid attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedTile {
    /// The underlying tile row.
    pub record: TileRecord,
    /// Centroid longitude.
    pub lon: f64,
    /// Centroid latitude.
    pub lat: f64,
}

/// A located tile with its outlier score.
///
/// Kept flat (rather than nesting [`LocatedTile`]) so it serializes directly
/// as one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTile {
    pub quadkey: String,
    pub avg_d_kbps: Option<f64>,
    pub avg_u_kbps: Option<f64>,
    pub avg_lat_ms: Option<f64>,
    pub tests: Option<i64>,
    pub devices: Option<i64>,
    pub tile: String,
    pub lon: f64,
    pub lat: f64,
    /// Whether the model flagged this tile as an outlier.
    pub is_anomaly: bool,
    /// Negated model decision value. Only comparable within one batch.
    pub anomaly_score: f64,
}

impl ScoredTile {
    /// Attaches scoring output to a located tile.
    #[must_use]
    pub fn new(located: LocatedTile, is_anomaly: bool, anomaly_score: f64) -> Self {
        let LocatedTile { record, lon, lat } = located;
        Self {
            quadkey: record.quadkey,
            avg_d_kbps: record.avg_d_kbps,
            avg_u_kbps: record.avg_u_kbps,
            avg_lat_ms: record.avg_lat_ms,
            tests: record.tests,
            devices: record.devices,
            tile: record.tile,
            lon,
            lat,
            is_anomaly,
            anomaly_score,
        }
    }
}

/// A geographic bounding box in degrees.
///
/// All four edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Creates a bounding box, rejecting inverted or non-finite bounds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBoxError`] if any bound is not finite or a
    /// minimum exceeds its maximum.
    pub fn new(
        lon_min: f64,
        lat_min: f64,
        lon_max: f64,
        lat_max: f64,
    ) -> Result<Self, InvalidBoundingBoxError> {
        let bbox = Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks that bounds are finite and ordered.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBoxError`] describing the first violation.
    pub fn validate(&self) -> Result<(), InvalidBoundingBoxError> {
        let bounds = [self.lon_min, self.lat_min, self.lon_max, self.lat_max];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(InvalidBoundingBoxError::new("bounds must be finite"));
        }
        if self.lon_min > self.lon_max {
            return Err(InvalidBoundingBoxError::new("lon_min exceeds lon_max"));
        }
        if self.lat_min > self.lat_max {
            return Err(InvalidBoundingBoxError::new("lat_min exceeds lat_max"));
        }
        Ok(())
    }

    /// Returns `true` if the point lies within the box, edges included.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.lon_min..=self.lon_max).contains(&lon) && (self.lat_min..=self.lat_max).contains(&lat)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.lon_min, self.lat_min, self.lon_max, self.lat_max
        )
    }
}

/// Parses `lon_min,lat_min,lon_max,lat_max`.
impl FromStr for BoundingBox {
    type Err = InvalidBoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| InvalidBoundingBoxError::new(format!("invalid number: {e}")))?;

        let [lon_min, lat_min, lon_max, lat_max] = parts[..] else {
            return Err(InvalidBoundingBoxError::new(format!(
                "expected 4 comma-separated values, got {}",
                parts.len()
            )));
        };

        Self::new(lon_min, lat_min, lon_max, lat_max)
    }
}

/// Error returned for a malformed or inverted [`BoundingBox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBoundingBoxError {
    /// What was wrong with the box.
    pub reason: String,
}

impl InvalidBoundingBoxError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for InvalidBoundingBoxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid bounding box: {}", self.reason)
    }
}

impl std::error::Error for InvalidBoundingBoxError {}
