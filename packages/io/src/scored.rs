//! Ranked scorer output as CSV.

use std::path::Path;

use tile_anomaly_tile_models::ScoredTile;

use crate::{DatasetError, paths};

/// Writes scored tiles to `path` in the given order, with a header row.
///
/// Missing KPI values are written as empty fields.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be created or written.
pub fn write_scored_csv(path: &Path, tiles: &[ScoredTile]) -> Result<(), DatasetError> {
    paths::ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for tile in tiles {
        writer.serialize(tile)?;
    }
    writer.flush()?;

    log::info!("Wrote {} scored tiles to {}", tiles.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CsvTable;

    #[test]
    fn writes_header_and_empty_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranked.csv");
        let tile = ScoredTile {
            quadkey: "0331".to_string(),
            avg_d_kbps: Some(3_000.0),
            avg_u_kbps: None,
            avg_lat_ms: Some(90.0),
            tests: Some(2),
            devices: Some(1),
            tile: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".to_string(),
            lon: 0.5,
            lat: 0.5,
            is_anomaly: true,
            anomaly_score: 0.25,
        };

        write_scored_csv(&path, &[tile]).unwrap();

        let table = CsvTable::read(&path).unwrap();
        assert_eq!(
            table.headers(),
            [
                "quadkey",
                "avg_d_kbps",
                "avg_u_kbps",
                "avg_lat_ms",
                "tests",
                "devices",
                "tile",
                "lon",
                "lat",
                "is_anomaly",
                "anomaly_score",
            ]
        );
        assert_eq!(table.len(), 1);
        let u = table.column_index("avg_u_kbps").unwrap();
        let score = table.column_index("anomaly_score").unwrap();
        assert_eq!(table.numeric_column(u), vec![None]);
        assert_eq!(table.numeric_column(score), vec![Some(0.25)]);
    }
}
