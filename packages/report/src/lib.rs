#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reporter: the last pipeline stage.
//!
//! Prints the highest-scoring labeled tiles as a GitHub-flavored Markdown
//! table. Read-only.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::Path;

use tile_anomaly_io::DatasetError;
use tile_anomaly_io::table::{CsvTable, parse_numeric};
use tile_anomaly_tile_models::{
    COL_ANOMALY_SCORE, COL_AVG_D_KBPS, COL_AVG_LAT_MS, COL_INDICATOR_TEXT, COL_QUADKEY,
};

/// Columns shown in the report, in display order.
pub const REPORT_COLUMNS: [&str; 5] = [
    COL_QUADKEY,
    COL_ANOMALY_SCORE,
    COL_AVG_LAT_MS,
    COL_AVG_D_KBPS,
    COL_INDICATOR_TEXT,
];

/// Errors that can occur while building the report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The ranking column is absent, so there is nothing to sort by.
    #[error("Missing {column} column in labeled dataset")]
    MissingColumn { column: &'static str },
}

/// Cell alignment in the rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Markdown table text, newline terminated.
    pub table: String,
    /// Data rows in the table.
    pub rows: usize,
}

/// Orders scores descending with missing scores last.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Picks the `top_n` rows with the highest `anomaly_score` and projects
/// them onto [`REPORT_COLUMNS`].
///
/// A missing display column renders as empty cells.
///
/// # Errors
///
/// Returns [`ReportError::MissingColumn`] if `anomaly_score` is absent.
pub fn top_rows(table: &CsvTable, top_n: usize) -> Result<Vec<Vec<String>>, ReportError> {
    let score_idx =
        table
            .column_index(COL_ANOMALY_SCORE)
            .ok_or(ReportError::MissingColumn {
                column: COL_ANOMALY_SCORE,
            })?;

    let columns: Vec<Option<usize>> = REPORT_COLUMNS
        .iter()
        .map(|&name| {
            let idx = table.column_index(name);
            if idx.is_none() {
                log::warn!("Column {name} not found; rendering it empty");
            }
            idx
        })
        .collect();

    let scores = table.numeric_column(score_idx);
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));

    Ok(order
        .into_iter()
        .take(top_n)
        .map(|i| {
            let row = &table.rows()[i];
            columns
                .iter()
                .map(|idx| {
                    idx.and_then(|idx| row.get(idx))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .collect())
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

/// Numeric columns (every non-empty cell parses) are right-aligned.
fn column_alignment(rows: &[Vec<String>], col: usize) -> Align {
    let mut cells = rows.iter().map(|r| r[col].trim()).filter(|c| !c.is_empty());
    let mut any = false;
    let numeric = cells.all(|c| {
        any = true;
        parse_numeric(c).is_some()
    });

    if numeric && any { Align::Right } else { Align::Left }
}

/// Renders `rows` under `headers` as a GitHub-flavored Markdown table.
///
/// Short rows are padded with empty cells; cells beyond the header count
/// are dropped.
#[must_use]
pub fn render_github_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| escape(h)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells: Vec<String> =
                r.iter().take(headers.len()).map(|c| escape(c)).collect();
            cells.resize(headers.len(), String::new());
            cells
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(j, h)| {
            rows.iter()
                .map(|r| r[j].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let aligns: Vec<Align> = (0..headers.len())
        .map(|j| column_alignment(&rows, j))
        .collect();

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .zip(&aligns)
            .map(|((cell, &w), align)| match align {
                Align::Left => format!("{cell:<w$}"),
                Align::Right => format!("{cell:>w$}"),
            })
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(headers.as_slice()));

    let separator: Vec<String> = widths
        .iter()
        .zip(&aligns)
        .map(|(&w, align)| match align {
            Align::Left => format!(":{}", "-".repeat(w + 1)),
            Align::Right => format!("{}:", "-".repeat(w + 1)),
        })
        .collect();
    let _ = writeln!(out, "|{}|", separator.join("|"));

    for row in &rows {
        let _ = writeln!(out, "{}", line(row.as_slice()));
    }

    out
}

/// Builds the report for the labeled dataset at `path`.
///
/// # Errors
///
/// Returns [`ReportError`] if the file cannot be read or has no
/// `anomaly_score` column.
pub fn run(path: &Path, top_n: usize) -> Result<Report, ReportError> {
    let table = CsvTable::read(path)?;
    log::info!("Loaded {} labeled tiles from {}", table.len(), path.display());

    let rows = top_rows(&table, top_n)?;
    if rows.is_empty() {
        log::warn!("{} has no rows", path.display());
    }

    Ok(Report {
        table: render_github_table(&REPORT_COLUMNS, &rows),
        rows: rows.len(),
    })
}
