//! Automated chart rendering for numeric columns.
//!
//! Charts are built as self-contained SVG documents and carried through the
//! context base64-encoded, mirroring how the report embeds them.

use super::table::{self, Dataset};
use crate::errors::CollaboratorError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Explicit result marker for a dataset with nothing to visualize.
pub const NO_NUMERIC_COLUMNS: &str = "No numeric columns found.";

const HISTOGRAM_BINS: usize = 10;

/// The visualization bundle produced by the visualization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualBundle {
    /// Status message; [`NO_NUMERIC_COLUMNS`] when the bundle is empty.
    pub message: String,
    /// Chart name to base64-encoded SVG.
    pub visualizations: BTreeMap<String, String>,
}

impl VisualBundle {
    /// Returns true if at least one chart was rendered.
    #[must_use]
    pub fn has_charts(&self) -> bool {
        !self.visualizations.is_empty()
    }

    /// Decodes a chart back to its SVG text.
    #[must_use]
    pub fn chart_svg(&self, name: &str) -> Option<String> {
        let encoded = self.visualizations.get(name)?;
        let bytes = BASE64.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Renders charts for every numeric column of the dataset.
///
/// Produces a correlation heatmap, a histogram per numeric column, and a
/// pairwise scatter of the first two numeric columns. A dataset with zero
/// numeric columns yields the explicit empty bundle rather than an error.
///
/// # Errors
///
/// Returns IO errors when persisting chart files was requested and fails.
pub fn render_visuals(
    dataset: &Dataset,
    output_dir: Option<&Path>,
    save_images: bool,
) -> Result<VisualBundle, CollaboratorError> {
    let numeric = dataset.numeric_columns();
    if numeric.is_empty() {
        warn!("no numeric columns found for visualization");
        return Ok(VisualBundle {
            message: NO_NUMERIC_COLUMNS.to_string(),
            visualizations: BTreeMap::new(),
        });
    }

    let mut charts: BTreeMap<String, String> = BTreeMap::new();

    if numeric.len() >= 2 {
        charts.insert(
            "correlation_heatmap".to_string(),
            correlation_heatmap(&numeric),
        );
        charts.insert(
            "pairwise_scatter".to_string(),
            scatter_plot(&numeric[0], &numeric[1]),
        );
    }
    for (name, values) in &numeric {
        charts.insert(format!("{name}_distribution"), histogram(name, values));
    }

    if save_images {
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir)?;
            for (name, svg) in &charts {
                std::fs::write(dir.join(format!("{name}.svg")), svg)?;
            }
        }
    }

    let visualizations = charts
        .into_iter()
        .map(|(name, svg)| (name, BASE64.encode(svg.as_bytes())))
        .collect();

    info!(charts = numeric.len(), "visualization generation completed");
    Ok(VisualBundle {
        message: "Visualizations created successfully!".to_string(),
        visualizations,
    })
}

fn svg_open(width: u32, height: u32, title: &str) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\">\n\
         <rect width=\"{width}\" height=\"{height}\" fill=\"white\"/>\n\
         <text x=\"{}\" y=\"20\" text-anchor=\"middle\" font-size=\"14\">{}</text>\n",
        width / 2,
        escape_xml(title)
    )
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Maps a correlation in `[-1, 1]` to a blue-white-red fill.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn correlation_color(r: f64) -> String {
    let clamped = r.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        let fade = (255.0 * (1.0 - clamped)) as u8;
        format!("rgb(255,{fade},{fade})")
    } else {
        let fade = (255.0 * (1.0 + clamped)) as u8;
        format!("rgb({fade},{fade},255)")
    }
}

fn correlation_heatmap(numeric: &[(String, Vec<Option<f64>>)]) -> String {
    let n = numeric.len();
    let cell = 60;
    let margin = 90;
    #[allow(clippy::cast_possible_truncation)]
    let size = (margin + n * cell + 20) as u32;
    let mut svg = svg_open(size, size, "Correlation Heatmap");

    for (row, (name_a, values_a)) in numeric.iter().enumerate() {
        let y = margin + row * cell;
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"11\">{}</text>\n",
            margin - 6,
            y + cell / 2 + 4,
            escape_xml(name_a)
        );
        let _ = write!(
            svg,
            "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\">{}</text>\n",
            margin + row * cell + cell / 2,
            margin - 8,
            escape_xml(name_a)
        );

        for (col, (_, values_b)) in numeric.iter().enumerate() {
            let x = margin + col * cell;
            let r = if row == col {
                1.0
            } else {
                table::pearson(values_a, values_b).unwrap_or(0.0)
            };
            let _ = write!(
                svg,
                "<rect x=\"{x}\" y=\"{y}\" width=\"{cell}\" height=\"{cell}\" \
                 fill=\"{}\" stroke=\"gray\"/>\n\
                 <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\">{r:.2}</text>\n",
                correlation_color(r),
                x + cell / 2,
                y + cell / 2 + 4,
            );
        }
    }
    svg.push_str("</svg>\n");
    svg
}

fn histogram(name: &str, values: &[Option<f64>]) -> String {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let (width, height, margin) = (480usize, 320usize, 40usize);
    #[allow(clippy::cast_possible_truncation)]
    let mut svg = svg_open(width as u32, height as u32, &format!("Distribution of {name}"));

    if present.is_empty() {
        svg.push_str("<text x=\"240\" y=\"160\" text-anchor=\"middle\">no data</text>\n</svg>\n");
        return svg;
    }

    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if (max - min).abs() < f64::EPSILON {
        1.0
    } else {
        max - min
    };

    let mut bins = [0usize; HISTOGRAM_BINS];
    for v in &present {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let idx = (((v - min) / span) * HISTOGRAM_BINS as f64) as usize;
        bins[idx.min(HISTOGRAM_BINS - 1)] += 1;
    }
    let tallest = bins.iter().copied().max().unwrap_or(1).max(1);

    let plot_w = width - 2 * margin;
    let plot_h = height - 2 * margin;
    let bar_w = plot_w / HISTOGRAM_BINS;
    for (i, count) in bins.iter().enumerate() {
        let bar_h = plot_h * count / tallest;
        let x = margin + i * bar_w;
        let y = height - margin - bar_h;
        let _ = write!(
            svg,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{}\" height=\"{bar_h}\" \
             fill=\"steelblue\" stroke=\"white\"/>\n",
            bar_w.saturating_sub(1)
        );
    }

    let _ = write!(
        svg,
        "<text x=\"{margin}\" y=\"{}\" font-size=\"10\">{min:.2}</text>\n\
         <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\">{max:.2}</text>\n",
        height - margin + 14,
        width - margin,
        height - margin + 14,
    );
    svg.push_str("</svg>\n");
    svg
}

fn scatter_plot(
    (name_x, xs): &(String, Vec<Option<f64>>),
    (name_y, ys): &(String, Vec<Option<f64>>),
) -> String {
    let (width, height, margin) = (480f64, 320f64, 40f64);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut svg = svg_open(
        width as u32,
        height as u32,
        &format!("{name_y} vs {name_x}"),
    );

    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if points.is_empty() {
        svg.push_str("<text x=\"240\" y=\"160\" text-anchor=\"middle\">no data</text>\n</svg>\n");
        return svg;
    }

    let min_x = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|(x, _)| *x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
    let span_x = if (max_x - min_x).abs() < f64::EPSILON { 1.0 } else { max_x - min_x };
    let span_y = if (max_y - min_y).abs() < f64::EPSILON { 1.0 } else { max_y - min_y };

    for (x, y) in &points {
        let px = margin + (x - min_x) / span_x * (width - 2.0 * margin);
        let py = height - margin - (y - min_y) / span_y * (height - 2.0 * margin);
        let _ = write!(
            svg,
            "<circle cx=\"{px:.1}\" cy=\"{py:.1}\" r=\"3\" fill=\"steelblue\" fill-opacity=\"0.7\"/>\n"
        );
    }

    let _ = write!(
        svg,
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\">{}</text>\n\
         <text x=\"14\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\" \
         transform=\"rotate(-90 14 {})\">{}</text>\n",
        width / 2.0,
        height - 8.0,
        escape_xml(name_x),
        height / 2.0,
        height / 2.0,
        escape_xml(name_y),
    );
    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numeric_dataset() -> Dataset {
        Dataset::parse_csv("x,y,label\n1,2,a\n2,4,b\n3,6,c\n4,8,d\n").unwrap()
    }

    #[test]
    fn renders_expected_chart_set() {
        let bundle = render_visuals(&numeric_dataset(), None, false).unwrap();
        assert!(bundle.has_charts());
        assert!(bundle.visualizations.contains_key("correlation_heatmap"));
        assert!(bundle.visualizations.contains_key("pairwise_scatter"));
        assert!(bundle.visualizations.contains_key("x_distribution"));
        assert!(bundle.visualizations.contains_key("y_distribution"));
        assert!(!bundle.visualizations.contains_key("label_distribution"));
    }

    #[test]
    fn charts_decode_to_svg() {
        let bundle = render_visuals(&numeric_dataset(), None, false).unwrap();
        let svg = bundle.chart_svg("x_distribution").unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Distribution of x"));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn zero_numeric_columns_is_explicit_empty_result() {
        let dataset = Dataset::parse_csv("name,city\nalice,lisbon\nbob,porto\n").unwrap();
        let bundle = render_visuals(&dataset, None, false).unwrap();
        assert_eq!(bundle.message, NO_NUMERIC_COLUMNS);
        assert!(!bundle.has_charts());
    }

    #[test]
    fn single_numeric_column_skips_heatmap() {
        let dataset = Dataset::parse_csv("only\n1\n2\n3\n").unwrap();
        let bundle = render_visuals(&dataset, None, false).unwrap();
        assert!(!bundle.visualizations.contains_key("correlation_heatmap"));
        assert!(bundle.visualizations.contains_key("only_distribution"));
    }

    #[test]
    fn saves_chart_files_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = render_visuals(&numeric_dataset(), Some(dir.path()), true).unwrap();
        for name in bundle.visualizations.keys() {
            assert!(dir.path().join(format!("{name}.svg")).exists());
        }
    }

    #[test]
    fn correlation_colors_span_the_scale() {
        assert_eq!(correlation_color(1.0), "rgb(255,0,0)");
        assert_eq!(correlation_color(-1.0), "rgb(0,0,255)");
        assert_eq!(correlation_color(0.0), "rgb(255,255,255)");
    }
}
