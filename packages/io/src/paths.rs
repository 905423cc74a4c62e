#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the pipeline's `data/` directory.
//!
//! Each stage reads the previous stage's output from these locations unless
//! told otherwise on the command line.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Raw performance tiles (geo filter input).
#[must_use]
pub fn raw_tiles_path() -> PathBuf {
    data_dir().join("performance_mobile_tiles.parquet")
}

/// City-filtered tiles with centroids (geo filter output, scorer input).
#[must_use]
pub fn city_tiles_path() -> PathBuf {
    data_dir().join("city_tiles.parquet")
}

/// Scored tiles ranked by anomaly score (scorer output, labeler input).
#[must_use]
pub fn anomalies_ranked_path() -> PathBuf {
    data_dir().join("anomalies_ranked.csv")
}

/// Labeled tiles (labeler output, reporter input).
#[must_use]
pub fn indicators_path() -> PathBuf {
    data_dir().join("indicators.csv")
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_paths_live_under_data_dir() {
        let data = data_dir();
        for path in [
            raw_tiles_path(),
            city_tiles_path(),
            anomalies_ranked_path(),
            indicators_path(),
        ] {
            assert_eq!(path.parent(), Some(data.as_path()));
        }
    }

    #[test]
    fn ensure_parent_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/out.csv");
        ensure_parent(&target).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        ensure_parent(Path::new("relative.csv")).unwrap();
    }
}
