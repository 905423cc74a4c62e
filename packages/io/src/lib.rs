#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset I/O for the tile anomaly pipeline.
//!
//! Columnar tile snapshots are read and written through an in-memory
//! `DuckDB` connection (`read_parquet` / `COPY ... TO`), which handles both
//! Parquet and CSV. Row-oriented stage outputs (ranked and labeled tables)
//! go through the `csv` crate so that unknown columns pass through intact.

pub mod paths;
pub mod progress;
pub mod scored;
pub mod table;
pub mod tiles;

use std::path::Path;

/// Errors that can occur while reading or writing pipeline datasets.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `DuckDB` query failed (includes Parquet decoding errors).
    #[error("DuckDB error: {0}")]
    Database(#[from] duckdb::Error),

    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file extension is not one the pipeline knows how to handle.
    #[error("Unsupported dataset format for {path} (expected .parquet or .csv)")]
    UnsupportedFormat {
        /// The offending path.
        path: String,
    },
}

/// On-disk format of a tile dataset, derived from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Csv,
}

impl TableFormat {
    /// Detects the format from the path's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("parquet" | "pq") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            _ => Err(DatasetError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            TableFormat::from_path(Path::new("a/tiles.parquet")).unwrap(),
            TableFormat::Parquet
        );
        assert_eq!(
            TableFormat::from_path(Path::new("tiles.CSV")).unwrap(),
            TableFormat::Csv
        );
        assert!(matches!(
            TableFormat::from_path(Path::new("tiles.json")),
            Err(DatasetError::UnsupportedFormat { .. })
        ));
        assert!(TableFormat::from_path(Path::new("tiles")).is_err());
    }
}
