#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Indicator labeler: the third pipeline stage.
//!
//! Adds an `indicator_text` column to a scored CSV. Each row's text lists
//! the KPI thresholds it crosses, in a fixed order, followed by a severity
//! tier derived from where its score sits among the batch's 90th, 95th, and
//! 99th percentiles. Every other column passes through unchanged.

pub mod rules;
pub mod severity;

use std::collections::BTreeMap;
use std::path::Path;

use tile_anomaly_config::PipelineConfig;
use tile_anomaly_io::DatasetError;
use tile_anomaly_io::table::CsvTable;
use tile_anomaly_tile_models::COL_INDICATOR_TEXT;

pub use rules::{Comparison, LabelMode, ThresholdRule, degradation_rules, snapshot_rules};
pub use severity::{Severity, SeverityTiers};

/// Text for a row with no issues. Unreachable: the severity tier is always
/// appended, so the issue list is never empty.
pub const NO_INDICATOR: &str = "No indicator triggered";

/// Separator between issues in the indicator text.
pub const ISSUE_SEPARATOR: &str = "; ";

/// Errors that can occur while labeling.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// The score column for the requested mode is absent.
    #[error("Missing {column} column (expected {mode} scorer output)")]
    MissingColumn {
        column: &'static str,
        mode: LabelMode,
    },

    /// Reading or writing the table failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// The values one row exposes to the labeling rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    /// KPI values, aligned with the rule list. `None` skips that rule.
    pub kpis: Vec<Option<f64>>,
    pub score: Option<f64>,
}

/// Issues for one row: every rule that fires, in rule order, followed by
/// the severity tier.
///
/// With no tiers (no score anywhere in the batch) every row is LOW.
#[must_use]
pub fn indicator_issues(
    rules: &[ThresholdRule],
    row: &RowView,
    tiers: Option<&SeverityTiers>,
) -> Vec<String> {
    let mut issues: Vec<String> = rules
        .iter()
        .zip(&row.kpis)
        .filter(|(rule, value)| rule.fires(**value))
        .map(|(rule, _)| rule.label.clone())
        .collect();

    let severity = tiers.map_or(Severity::Low, |t| t.classify(row.score));
    issues.push(severity.label().to_string());

    issues
}

/// Joins issues into the final indicator text.
#[must_use]
pub fn indicator_text(issues: &[String]) -> String {
    if issues.is_empty() {
        return NO_INDICATOR.to_string();
    }
    issues.join(ISSUE_SEPARATOR)
}

/// Counts from one labeling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSummary {
    pub rows: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Rule columns absent from the input; those checks were skipped.
    pub missing_kpi_columns: Vec<&'static str>,
}

/// Labels tables for one mode with a fixed set of thresholds.
#[derive(Debug, Clone)]
pub struct Labeler {
    mode: LabelMode,
    rules: Vec<ThresholdRule>,
}

impl Labeler {
    /// Builds the rule list for `mode` from the configured thresholds.
    #[must_use]
    pub fn new(mode: LabelMode, config: &PipelineConfig) -> Self {
        let rules = match mode {
            LabelMode::Snapshot => snapshot_rules(&config.snapshot),
            LabelMode::Degradation => degradation_rules(&config.degradation),
        };
        Self { mode, rules }
    }

    #[must_use]
    pub const fn mode(&self) -> LabelMode {
        self.mode
    }

    #[must_use]
    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Sets `indicator_text` on every row of `table`, replacing the column if
    /// it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::MissingColumn`] if the mode's score column is
    /// absent. The table is left untouched in that case.
    pub fn label_table(&self, table: &mut CsvTable) -> Result<LabelSummary, LabelError> {
        let score_column = self.mode.score_column();
        let score_idx =
            table
                .column_index(score_column)
                .ok_or(LabelError::MissingColumn {
                    column: score_column,
                    mode: self.mode,
                })?;

        let mut summary = LabelSummary {
            rows: table.len(),
            ..LabelSummary::default()
        };

        let kpi_columns: Vec<Vec<Option<f64>>> = self
            .rules
            .iter()
            .map(|rule| {
                table.column_index(rule.column).map_or_else(
                    || {
                        log::warn!("Column {} not found; skipping that check", rule.column);
                        summary.missing_kpi_columns.push(rule.column);
                        vec![None; table.len()]
                    },
                    |idx| table.numeric_column(idx),
                )
            })
            .collect();

        let scores = table.numeric_column(score_idx);
        let tiers = SeverityTiers::from_scores(&scores);
        match &tiers {
            Some(t) => log::info!(
                "{score_column} cutoffs: p90={:.6} p95={:.6} p99={:.6}",
                t.p90,
                t.p95,
                t.p99
            ),
            None => log::warn!("No usable {score_column} values; every row is LOW"),
        }

        let texts: Vec<String> = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let row = RowView {
                    kpis: kpi_columns.iter().map(|column| column[i]).collect(),
                    score,
                };
                let severity = tiers.as_ref().map_or(Severity::Low, |t| t.classify(score));
                *summary.by_severity.entry(severity).or_default() += 1;

                indicator_text(&indicator_issues(&self.rules, &row, tiers.as_ref()))
            })
            .collect();

        table.set_column(COL_INDICATOR_TEXT, texts);
        Ok(summary)
    }
}

/// Runs the stage: reads `input`, labels it, writes `output`.
///
/// Nothing is written if labeling fails.
///
/// # Errors
///
/// Returns [`LabelError`] if the input cannot be read, lacks the score
/// column, or the output cannot be written.
pub fn run(
    mode: LabelMode,
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<LabelSummary, LabelError> {
    let mut table = CsvTable::read(input)?;
    log::info!(
        "Labeling {} rows from {} in {mode} mode",
        table.len(),
        input.display()
    );

    let summary = Labeler::new(mode, config).label_table(&mut table)?;
    table.write(output)?;

    for (severity, count) in &summary.by_severity {
        log::info!("  {severity}: {count}");
    }
    log::info!("Wrote {} labeled rows to {}", summary.rows, output.display());

    Ok(summary)
}
