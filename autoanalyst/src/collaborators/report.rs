//! Report assembly: renders the final analysis document.

use super::insights::{InsightMethod, InsightReport};
use super::parser::{ColumnStats, DatasetSummary};
use super::visuals::VisualBundle;
use crate::errors::CollaboratorError;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Assembles the summary, insights, and charts into a self-contained HTML
/// document and writes it to `output_path`.
///
/// # Errors
///
/// Returns IO errors when the document cannot be written.
pub fn write_report(
    summary: &DatasetSummary,
    insights: &InsightReport,
    visuals: &VisualBundle,
    output_path: impl AsRef<Path>,
) -> Result<PathBuf, CollaboratorError> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let html = render_html(summary, insights, visuals);
    std::fs::write(output_path, html)?;
    info!(path = %output_path.display(), "report generated");
    Ok(output_path.to_path_buf())
}

fn render_html(
    summary: &DatasetSummary,
    insights: &InsightReport,
    visuals: &VisualBundle,
) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Data Analysis Report</title>\n\
         <style>\n\
         body { font-family: sans-serif; margin: 2em auto; max-width: 960px; }\n\
         table { border-collapse: collapse; margin: 1em 0; }\n\
         th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }\n\
         img { max-width: 100%; margin: 1em 0; }\n\
         </style>\n</head>\n<body>\n",
    );

    let _ = write!(
        html,
        "<h1>Data Analysis Report</h1>\n<p>Generated {} &middot; {} rows &times; {} columns</p>\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        summary.num_rows,
        summary.num_columns,
    );

    html.push_str("<h2>Dataset Summary</h2>\n<table>\n<tr><th>Column</th><th>Type</th><th>Missing</th><th>Missing %</th><th>Detail</th></tr>\n");
    for column in &summary.columns {
        let dtype = summary.dtypes.get(column).map_or("?", String::as_str);
        let missing = summary.missing_counts.get(column).copied().unwrap_or(0);
        let pct = summary
            .missing_percentage
            .get(column)
            .copied()
            .unwrap_or(0.0);
        let detail = summary
            .summary_stats
            .get(column)
            .map_or_else(String::new, describe_cell);
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{missing}</td><td>{pct:.1}%</td><td>{detail}</td></tr>\n",
            escape_html(column),
            dtype,
        );
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Insights</h2>\n");
    if let InsightMethod::Llm { model } = &insights.method {
        let _ = write!(html, "<p><em>Narrative generated by {}.</em></p>\n", escape_html(model));
    }
    if let Some(narrative) = &insights.narrative {
        let _ = write!(html, "<p>{}</p>\n", escape_html(narrative));
    }
    html.push_str("<ul>\n");
    for bullet in &insights.bullets {
        let _ = write!(html, "<li>{}</li>\n", escape_html(bullet));
    }
    html.push_str("</ul>\n");

    html.push_str("<h2>Visualizations</h2>\n");
    if visuals.has_charts() {
        for (name, encoded) in &visuals.visualizations {
            let _ = write!(
                html,
                "<h3>{}</h3>\n<img src=\"data:image/svg+xml;base64,{encoded}\" alt=\"{}\">\n",
                escape_html(name),
                escape_html(name),
            );
        }
    } else {
        let _ = write!(html, "<p>{}</p>\n", escape_html(&visuals.message));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn describe_cell(stats: &ColumnStats) -> String {
    match stats {
        ColumnStats::Numeric { mean, median, .. } => {
            let mean = mean.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            let median = median.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            format!("mean {mean}, median {median}")
        }
        ColumnStats::Categorical { unique, top, freq, .. } => {
            let top = top
                .as_deref()
                .map_or_else(|| "-".to_string(), |t| escape_html(t));
            format!("{unique} unique, top '{top}' ({freq}x)")
        }
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
