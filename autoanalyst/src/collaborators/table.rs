//! In-memory tabular data: the dataset handle threaded through the pipeline.

use crate::errors::CollaboratorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Whole numbers only.
    Int,
    /// At least one fractional number.
    Float,
    /// Boolean values only.
    Bool,
    /// Anything else.
    Text,
}

impl ColumnType {
    /// Returns true for the numeric types.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int64",
            Self::Float => "float64",
            Self::Bool => "bool",
            Self::Text => "object",
        };
        write!(f, "{name}")
    }
}

/// Where a pipeline run gets its dataset from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DatasetSource {
    /// A table already in memory.
    Inline {
        /// The dataset.
        dataset: Dataset,
    },
    /// A CSV file on disk.
    Path {
        /// The file path.
        path: PathBuf,
    },
}

impl From<Dataset> for DatasetSource {
    fn from(dataset: Dataset) -> Self {
        Self::Inline { dataset }
    }
}

impl From<PathBuf> for DatasetSource {
    fn from(path: PathBuf) -> Self {
        Self::Path { path }
    }
}

/// A small row-major table with heterogeneous, JSON-valued cells.
///
/// Missing cells are `null`. Rows always have exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

impl Dataset {
    /// Creates a dataset from column names and rows.
    ///
    /// # Errors
    ///
    /// Returns a parse error if any row's width differs from the header.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<Self, CollaboratorError> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(CollaboratorError::parse(format!(
                    "row {i} has {} cells but the header has {} columns",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Reads a CSV file, inferring cell types.
    ///
    /// The first record is the header. Quoted fields (with `""` escapes) are
    /// supported; blank cells become `null`.
    ///
    /// # Errors
    ///
    /// Returns not-found for a missing path, IO errors from reading, and
    /// parse errors for an empty file or ragged rows.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, CollaboratorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CollaboratorError::not_found(path));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse_csv(&raw)
    }

    /// Parses CSV text, inferring cell types.
    ///
    /// # Errors
    ///
    /// Returns a parse error for empty input or ragged rows.
    pub fn parse_csv(raw: &str) -> Result<Self, CollaboratorError> {
        let mut records = split_csv_records(raw).into_iter();
        let header = records
            .next()
            .ok_or_else(|| CollaboratorError::parse("empty CSV input"))?;
        let columns: Vec<String> = header.into_iter().map(|c| c.trim().to_string()).collect();

        let rows = records
            .map(|record| record.iter().map(|cell| infer_cell(cell)).collect())
            .collect();

        Self::new(columns, rows)
    }

    /// Writes the dataset as CSV.
    ///
    /// # Errors
    ///
    /// Returns IO errors from writing.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), CollaboratorError> {
        let mut out = String::new();
        out.push_str(&self.columns.iter().map(|c| escape_csv(c)).collect::<Vec<_>>().join(","));
        out.push('\n');
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(cell_to_csv).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column names.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Returns the cells of a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&serde_json::Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Infers the type of the column at `idx`.
    ///
    /// Nulls are ignored; a column of only nulls is text.
    #[must_use]
    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut saw_int = false;
        let mut saw_float = false;
        let mut saw_bool = false;
        let mut saw_text = false;
        for row in &self.rows {
            match &row[idx] {
                serde_json::Value::Null => {}
                serde_json::Value::Number(n) => {
                    if n.is_i64() || n.is_u64() {
                        saw_int = true;
                    } else {
                        saw_float = true;
                    }
                }
                serde_json::Value::Bool(_) => saw_bool = true,
                _ => saw_text = true,
            }
        }
        if saw_text || (saw_bool && (saw_int || saw_float)) {
            ColumnType::Text
        } else if saw_float {
            ColumnType::Float
        } else if saw_int {
            ColumnType::Int
        } else if saw_bool {
            ColumnType::Bool
        } else {
            ColumnType::Text
        }
    }

    /// Counts the missing (null) cells of each column.
    #[must_use]
    pub fn missing_counts(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let missing = self.rows.iter().filter(|row| row[idx].is_null()).count();
                (name.clone(), missing)
            })
            .collect()
    }

    /// Returns the numeric columns as `(name, values)` pairs, with missing
    /// cells as `None`.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<(String, Vec<Option<f64>>)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.column_type(*idx).is_numeric())
            .map(|(idx, name)| {
                let values = self
                    .rows
                    .iter()
                    .map(|row| row[idx].as_f64())
                    .collect();
                (name.clone(), values)
            })
            .collect()
    }

    /// Returns the first `n` rows as name-to-value records.
    #[must_use]
    pub fn head(&self, n: usize) -> Vec<BTreeMap<String, serde_json::Value>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Cleans text cells in place: trims whitespace and turns empty or
    /// `"nan"` strings into nulls.
    pub fn clean_text_cells(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let serde_json::Value::String(s) = cell {
                    let trimmed = s.trim();
                    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                        *cell = serde_json::Value::Null;
                    } else if trimmed.len() != s.len() {
                        *cell = serde_json::Value::String(trimmed.to_string());
                    }
                }
            }
        }
    }
}

/// Splits CSV text into records of raw string cells.
fn split_csv_records(raw: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut cell));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut cell));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record = Vec::new();
            }
            other => cell.push(other),
        }
    }
    if !cell.is_empty() || !record.is_empty() {
        record.push(cell);
        records.push(record);
    }
    records
}

/// Infers a typed cell value from raw CSV text.
fn infer_cell(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return serde_json::Value::from(f);
        }
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return serde_json::Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return serde_json::Value::Bool(false);
    }
    serde_json::Value::String(trimmed.to_string())
}

fn cell_to_csv(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => escape_csv(s),
        other => other.to_string(),
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Mean of the present values; `None` when all are missing.
#[must_use]
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Sample standard deviation of the present values.
#[must_use]
pub fn std_dev(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let m = present.iter().sum::<f64>() / present.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let var = present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (present.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linear-interpolated quantile of the present values, `q` in `[0, 1]`.
#[must_use]
pub fn quantile(values: &[Option<f64>], q: f64) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    #[allow(clippy::cast_precision_loss)]
    let pos = q * (present.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(present.len() - 1);
    let frac = pos - pos.floor();
    Some(present[lo] + (present[hi] - present[lo]) * frac)
}

/// Pearson correlation over rows where both values are present.
///
/// `None` when fewer than two paired values exist or either side has zero
/// variance.
#[must_use]
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let my = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let cov: f64 = pairs.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let vx: f64 = pairs.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    let vy: f64 = pairs.iter().map(|(_, y)| (y - my).powi(2)).sum();
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}
