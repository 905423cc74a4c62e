//! Schema-agnostic CSV tables.
//!
//! The labeler and reporter only care about a handful of named columns but
//! must pass every other column through untouched, so rows are kept as raw
//! string records and numeric columns are parsed on demand.

use std::path::Path;

use csv::StringRecord;

use crate::{DatasetError, paths};

/// A CSV file held in memory as a header plus raw string rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    /// Reads a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be opened or a row has a
    /// different number of fields than the header.
    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    /// Writes the table, header first.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be created or written.
    pub fn write(&self, path: &Path) -> Result<(), DatasetError> {
        paths::ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Parses every value of column `idx` as a number.
    ///
    /// Empty, unparseable, and `NaN` fields become `None`.
    #[must_use]
    pub fn numeric_column(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(idx).and_then(parse_numeric))
            .collect()
    }

    /// Sets column `name` to `values`, replacing it if it already exists or
    /// appending it as the last column otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have exactly one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        assert_eq!(
            values.len(),
            self.rows.len(),
            "column {name} must have one value per row"
        );

        let existing = self.column_index(name);
        if existing.is_none() {
            self.headers.push(name.to_string());
        }

        for (row, value) in self.rows.iter_mut().zip(values) {
            *row = match existing {
                Some(idx) => row
                    .iter()
                    .enumerate()
                    .map(|(i, field)| if i == idx { value.as_str() } else { field })
                    .collect(),
                None => {
                    let mut extended = row.clone();
                    extended.push_field(&value);
                    extended
                }
            };
        }
    }
}

/// Parses a CSV field as a finite number. Empty or `NaN` fields are missing.
#[must_use]
pub fn parse_numeric(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}
