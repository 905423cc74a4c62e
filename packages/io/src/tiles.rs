//! Columnar tile snapshots via `DuckDB`.
//!
//! Raw tiles are read with the null-KPI filter pushed into the query so the
//! rows never reach Rust. Located tiles are appended into a temporary table
//! and exported with `COPY ... TO`.

use std::path::Path;

use duckdb::Connection;
use tile_anomaly_tile_models::{LocatedTile, TileRecord};

use crate::{DatasetError, TableFormat, paths};

/// Column list shared by every tile query, in output order.
const TILE_COLUMNS: &str = "CAST(quadkey AS VARCHAR) AS quadkey,
    CAST(avg_d_kbps AS DOUBLE) AS avg_d_kbps,
    CAST(avg_u_kbps AS DOUBLE) AS avg_u_kbps,
    CAST(avg_lat_ms AS DOUBLE) AS avg_lat_ms,
    CAST(tests AS BIGINT) AS tests,
    CAST(devices AS BIGINT) AS devices,
    CAST(tile AS VARCHAR) AS tile";

/// Core KPIs that must be present for a raw tile to be kept.
const CORE_KPI_FILTER: &str =
    "avg_d_kbps IS NOT NULL AND avg_u_kbps IS NOT NULL AND avg_lat_ms IS NOT NULL";

fn open() -> Result<Connection, DatasetError> {
    Ok(Connection::open_in_memory()?)
}

/// Quotes `path` as a SQL string literal.
fn sql_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

/// Table function expression that scans `path` in its detected format.
///
/// CSV quadkeys are forced to text so leading zeros survive.
fn scan_expr(path: &Path) -> Result<String, DatasetError> {
    Ok(match TableFormat::from_path(path)? {
        TableFormat::Parquet => format!("read_parquet({})", sql_path(path)),
        TableFormat::Csv => format!(
            "read_csv({}, header = true, auto_detect = true, types = {{'quadkey': 'VARCHAR'}})",
            sql_path(path)
        ),
    })
}

fn record_from_row(row: &duckdb::Row<'_>) -> Result<TileRecord, duckdb::Error> {
    Ok(TileRecord {
        quadkey: row.get(0)?,
        avg_d_kbps: row.get(1)?,
        avg_u_kbps: row.get(2)?,
        avg_lat_ms: row.get(3)?,
        tests: row.get(4)?,
        devices: row.get(5)?,
        tile: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

/// Reads raw tiles, keeping only rows whose downlink, uplink, and latency are
/// all present.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be scanned or lacks a
/// required column.
pub fn read_raw_tiles(path: &Path) -> Result<Vec<TileRecord>, DatasetError> {
    let conn = open()?;
    let source = scan_expr(path)?;

    let total: i64 = conn.query_row(&format!("SELECT count(*) FROM {source}"), [], |row| {
        row.get(0)
    })?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {TILE_COLUMNS} FROM {source} WHERE {CORE_KPI_FILTER}"
    ))?;
    let mut rows = stmt.query([])?;

    let mut tiles = Vec::new();
    while let Some(row) = rows.next()? {
        tiles.push(record_from_row(row)?);
    }

    log::info!(
        "Read {} of {total} tiles from {} ({} dropped for null KPIs)",
        tiles.len(),
        path.display(),
        usize::try_from(total).unwrap_or(0).saturating_sub(tiles.len()),
    );

    Ok(tiles)
}

/// Reads a located-tile snapshot written by [`write_located_tiles`].
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be scanned or lacks a
/// required column.
pub fn read_located_tiles(path: &Path) -> Result<Vec<LocatedTile>, DatasetError> {
    let conn = open()?;
    let source = scan_expr(path)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {TILE_COLUMNS}, CAST(lon AS DOUBLE), CAST(lat AS DOUBLE) FROM {source}"
    ))?;
    let mut rows = stmt.query([])?;

    let mut tiles = Vec::new();
    while let Some(row) = rows.next()? {
        tiles.push(LocatedTile {
            record: record_from_row(row)?,
            lon: row.get(7)?,
            lat: row.get(8)?,
        });
    }

    log::info!("Read {} located tiles from {}", tiles.len(), path.display());
    Ok(tiles)
}

/// Writes located tiles to `path` as Parquet or CSV (by extension).
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DatasetError`] if the format is unsupported or the export
/// fails.
pub fn write_located_tiles(path: &Path, tiles: &[LocatedTile]) -> Result<u64, DatasetError> {
    let format = TableFormat::from_path(path)?;
    paths::ensure_parent(path)?;

    let conn = open()?;
    conn.execute_batch(
        "CREATE TABLE located_tiles (
            quadkey VARCHAR NOT NULL,
            avg_d_kbps DOUBLE,
            avg_u_kbps DOUBLE,
            avg_lat_ms DOUBLE,
            tests BIGINT,
            devices BIGINT,
            tile VARCHAR NOT NULL,
            lon DOUBLE NOT NULL,
            lat DOUBLE NOT NULL
        );",
    )?;

    {
        let mut appender = conn.appender("located_tiles")?;
        for tile in tiles {
            let r = &tile.record;
            appender.append_row(duckdb::params![
                r.quadkey,
                r.avg_d_kbps,
                r.avg_u_kbps,
                r.avg_lat_ms,
                r.tests,
                r.devices,
                r.tile,
                tile.lon,
                tile.lat,
            ])?;
        }
        appender.flush()?;
    }

    let options = match format {
        TableFormat::Parquet => "FORMAT PARQUET",
        TableFormat::Csv => "FORMAT CSV, HEADER",
    };
    conn.execute_batch(&format!(
        "COPY located_tiles TO {} ({options});",
        sql_path(path)
    ))?;

    log::info!("Wrote {} located tiles to {}", tiles.len(), path.display());
    Ok(tiles.len() as u64)
}
