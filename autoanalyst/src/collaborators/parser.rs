//! Dataset parsing and summarization.

use super::table::{self, ColumnType, Dataset, DatasetSource};
use crate::errors::CollaboratorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Options controlling summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions {
    /// How many head rows to include as a preview.
    pub sample_rows: usize,
    /// Where to write the cleaned CSV copy, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_clean_path: Option<PathBuf>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sample_rows: 5,
            save_clean_path: None,
        }
    }
}

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnStats {
    /// Statistics for a numeric column.
    Numeric {
        /// Present (non-missing) value count.
        count: usize,
        /// Arithmetic mean.
        mean: Option<f64>,
        /// Sample standard deviation.
        std: Option<f64>,
        /// Minimum.
        min: Option<f64>,
        /// First quartile.
        q25: Option<f64>,
        /// Median.
        median: Option<f64>,
        /// Third quartile.
        q75: Option<f64>,
        /// Maximum.
        max: Option<f64>,
    },
    /// Statistics for a non-numeric column.
    Categorical {
        /// Present (non-missing) value count.
        count: usize,
        /// Number of distinct values.
        unique: usize,
        /// Most frequent value, rendered as text.
        top: Option<String>,
        /// Frequency of the most frequent value.
        freq: usize,
    },
}

/// The structured summary produced by the parsing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Number of rows.
    pub num_rows: usize,
    /// Number of columns.
    pub num_columns: usize,
    /// Column names in table order.
    pub columns: Vec<String>,
    /// Inferred dtype name per column.
    pub dtypes: BTreeMap<String, String>,
    /// Missing-cell count per column.
    pub missing_counts: BTreeMap<String, usize>,
    /// Missing-cell percentage per column.
    pub missing_percentage: BTreeMap<String, f64>,
    /// Descriptive statistics per column.
    pub summary_stats: BTreeMap<String, ColumnStats>,
    /// A preview of the first rows.
    pub sample_rows: Vec<BTreeMap<String, serde_json::Value>>,
    /// Where the cleaned copy was written, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_csv_path: Option<PathBuf>,
}

/// Resolves a dataset source, cleans it, and produces a structured summary.
///
/// The returned dataset is the cleaned in-memory table; downstream stages
/// work from it rather than re-reading the source.
///
/// # Errors
///
/// Returns not-found for a missing path, parse errors for malformed CSV, and
/// IO errors when the cleaned copy cannot be written.
pub fn parse_dataset(
    source: &DatasetSource,
    options: &ParseOptions,
) -> Result<(Dataset, DatasetSummary), CollaboratorError> {
    let mut dataset = match source {
        DatasetSource::Inline { dataset } => dataset.clone(),
        DatasetSource::Path { path } => Dataset::read_csv(path)?,
    };
    dataset.clean_text_cells();

    let num_rows = dataset.num_rows();
    let num_columns = dataset.num_columns();
    let columns = dataset.column_names().to_vec();

    let mut dtypes = BTreeMap::new();
    let mut summary_stats = BTreeMap::new();
    for (idx, name) in columns.iter().enumerate() {
        let ty = dataset.column_type(idx);
        dtypes.insert(name.clone(), ty.to_string());
        summary_stats.insert(name.clone(), describe_column(&dataset, idx, ty));
    }

    let missing_counts = dataset.missing_counts();
    let missing_percentage = missing_counts
        .iter()
        .map(|(name, &count)| {
            #[allow(clippy::cast_precision_loss)]
            let pct = if num_rows > 0 {
                count as f64 / num_rows as f64 * 100.0
            } else {
                0.0
            };
            (name.clone(), pct)
        })
        .collect();

    let cleaned_csv_path = match &options.save_clean_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            dataset.write_csv(path)?;
            Some(path.clone())
        }
        None => None,
    };

    let summary = DatasetSummary {
        num_rows,
        num_columns,
        columns,
        dtypes,
        missing_counts,
        missing_percentage,
        summary_stats,
        sample_rows: dataset.head(options.sample_rows),
        cleaned_csv_path,
    };

    info!(rows = num_rows, columns = num_columns, "dataset parsed");
    Ok((dataset, summary))
}

fn describe_column(dataset: &Dataset, idx: usize, ty: ColumnType) -> ColumnStats {
    let name = &dataset.column_names()[idx];
    if ty.is_numeric() {
        let values: Vec<Option<f64>> = dataset
            .column(name)
            .unwrap_or_default()
            .iter()
            .map(|v| v.as_f64())
            .collect();
        let count = values.iter().flatten().count();
        ColumnStats::Numeric {
            count,
            mean: table::mean(&values),
            std: table::std_dev(&values),
            min: table::quantile(&values, 0.0),
            q25: table::quantile(&values, 0.25),
            median: table::quantile(&values, 0.5),
            q75: table::quantile(&values, 0.75),
            max: table::quantile(&values, 1.0),
        }
    } else {
        let cells = dataset.column(name).unwrap_or_default();
        let mut freqs: BTreeMap<String, usize> = BTreeMap::new();
        let mut count = 0;
        for cell in cells {
            if cell.is_null() {
                continue;
            }
            count += 1;
            let rendered = match cell {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            *freqs.entry(rendered).or_insert(0) += 1;
        }
        let unique = freqs.len();
        let (top, freq) = freqs
            .into_iter()
            .max_by_key(|(_, n)| *n)
            .map_or((None, 0), |(value, n)| (Some(value), n));
        ColumnStats::Categorical {
            count,
            unique,
            top,
            freq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_source() -> DatasetSource {
        Dataset::parse_csv("name,age,score\nalice,30,91.5\nbob,25,78.0\nbob,,88.25\n")
            .unwrap()
            .into()
    }

    #[test]
    fn summary_shape_counts_and_dtypes() {
        let (dataset, summary) = parse_dataset(&sample_source(), &ParseOptions::default()).unwrap();
        assert_eq!(dataset.num_rows(), 3);
        assert_eq!(summary.num_rows, 3);
        assert_eq!(summary.num_columns, 3);
        assert_eq!(summary.dtypes["name"], "object");
        assert_eq!(summary.dtypes["age"], "int64");
        assert_eq!(summary.dtypes["score"], "float64");
    }

    #[test]
    fn missing_percentages() {
        let (_, summary) = parse_dataset(&sample_source(), &ParseOptions::default()).unwrap();
        assert_eq!(summary.missing_counts["age"], 1);
        assert!((summary.missing_percentage["age"] - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.missing_percentage["name"]).abs() < f64::EPSILON);
    }

    #[test]
    fn numeric_describe() {
        let (_, summary) = parse_dataset(&sample_source(), &ParseOptions::default()).unwrap();
        match &summary.summary_stats["score"] {
            ColumnStats::Numeric {
                count,
                mean,
                min,
                median,
                max,
                ..
            } => {
                assert_eq!(*count, 3);
                assert!((mean.unwrap() - 85.916_666_666_666_67).abs() < 1e-9);
                assert_eq!(*min, Some(78.0));
                assert_eq!(*median, Some(88.25));
                assert_eq!(*max, Some(91.5));
            }
            other => panic!("expected numeric stats, got {other:?}"),
        }
    }

    #[test]
    fn categorical_describe() {
        let (_, summary) = parse_dataset(&sample_source(), &ParseOptions::default()).unwrap();
        match &summary.summary_stats["name"] {
            ColumnStats::Categorical {
                count,
                unique,
                top,
                freq,
            } => {
                assert_eq!(*count, 3);
                assert_eq!(*unique, 2);
                assert_eq!(top.as_deref(), Some("bob"));
                assert_eq!(*freq, 2);
            }
            other => panic!("expected categorical stats, got {other:?}"),
        }
    }

    #[test]
    fn sample_rows_respect_limit() {
        let options = ParseOptions {
            sample_rows: 2,
            save_clean_path: None,
        };
        let (_, summary) = parse_dataset(&sample_source(), &options).unwrap();
        assert_eq!(summary.sample_rows.len(), 2);
        assert_eq!(summary.sample_rows[0]["name"], json!("alice"));
    }

    #[test]
    fn cleaned_copy_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let clean = dir.path().join("cleaned.csv");
        let options = ParseOptions {
            sample_rows: 5,
            save_clean_path: Some(clean.clone()),
        };

        let (_, summary) = parse_dataset(&sample_source(), &options).unwrap();
        assert_eq!(summary.cleaned_csv_path, Some(clean.clone()));
        assert!(clean.exists());
    }

    #[test]
    fn missing_path_fails_with_not_found() {
        let source = DatasetSource::Path {
            path: PathBuf::from("/no/such/file.csv"),
        };
        let result = parse_dataset(&source, &ParseOptions::default());
        assert!(matches!(result, Err(CollaboratorError::NotFound { .. })));
    }
}
