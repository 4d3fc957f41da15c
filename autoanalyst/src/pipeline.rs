//! The reference analysis pipeline: parse, derive insights, render charts,
//! assemble the report.
//!
//! The graph is a fixed linear chain; each stage adapter reads its typed
//! inputs from the context, calls the matching collaborator, and returns the
//! fields it owns.

use crate::collaborators::insights::{generate_insights, InsightBackend, InsightReport};
use crate::collaborators::parser::{parse_dataset, DatasetSummary, ParseOptions};
use crate::collaborators::report::write_report;
use crate::collaborators::table::{Dataset, DatasetSource};
use crate::collaborators::visuals::{render_visuals, VisualBundle};
use crate::config::AnalysisConfig;
use crate::context::{keys, AnalysisContext, ContextUpdate};
use crate::errors::AnalystError;
use crate::events::LoggingEventSink;
use crate::executor::{CompiledPlan, Executor};
use crate::graph::{GraphBuilder, END};
use crate::stage::{Stage, StageOutput};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Stage name of the parsing stage.
pub const DATA_PARSER: &str = "data_parser";
/// Stage name of the insight stage.
pub const INSIGHT_GENERATOR: &str = "insight_generator";
/// Stage name of the visualization stage.
pub const VISUALIZATION: &str = "visualization";
/// Stage name of the report stage.
pub const REPORT_GENERATOR: &str = "report_generator";

/// Reads a required typed field, or produces the stage failure to return.
fn require<T: DeserializeOwned>(ctx: &AnalysisContext, key: &str) -> Result<T, StageOutput> {
    ctx.get_as::<T>(key)
        .ok_or_else(|| StageOutput::fail(format!("required context field '{key}' is missing or malformed")))
}

fn encode(key: &str, value: impl serde::Serialize) -> Result<serde_json::Value, StageOutput> {
    serde_json::to_value(value)
        .map_err(|e| StageOutput::fail(format!("could not encode field '{key}': {e}")))
}

/// Resolves the dataset source, cleans the table, and summarizes it.
///
/// Owns the `summary` field and replaces `dataset` with the cleaned
/// in-memory table so downstream stages never re-read the source.
#[derive(Debug, Clone, Default)]
pub struct ParseStage;

#[async_trait]
impl Stage for ParseStage {
    fn name(&self) -> &str {
        DATA_PARSER
    }

    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput {
        let source = match require::<DatasetSource>(ctx, keys::DATASET) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let config = match require::<AnalysisConfig>(ctx, keys::CONFIG) {
            Ok(v) => v,
            Err(out) => return out,
        };

        let options = ParseOptions {
            sample_rows: config.sample_rows,
            save_clean_path: config
                .save_clean_copy
                .then(|| config.output_dir.join("cleaned_dataset.csv")),
        };

        match parse_dataset(&source, &options) {
            Ok((dataset, summary)) => {
                let mut update = ContextUpdate::new();
                let cleaned: DatasetSource = dataset.into();
                match encode(keys::DATASET, &cleaned) {
                    Ok(value) => {
                        update.insert(keys::DATASET.to_string(), value);
                    }
                    Err(out) => return out,
                }
                match encode(keys::SUMMARY, &summary) {
                    Ok(value) => {
                        update.insert(keys::SUMMARY.to_string(), value);
                    }
                    Err(out) => return out,
                }
                StageOutput::ok(update)
            }
            Err(err) => StageOutput::fail(err.to_string()),
        }
    }
}

/// Generates the insight payload. Owns the `insights` field.
#[derive(Default)]
pub struct InsightStage {
    backend: Option<Arc<dyn InsightBackend>>,
}

impl InsightStage {
    /// Creates an insight stage with no generation backend (rule-based only).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a generation backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn InsightBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}

impl fmt::Debug for InsightStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightStage")
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

#[async_trait]
impl Stage for InsightStage {
    fn name(&self) -> &str {
        INSIGHT_GENERATOR
    }

    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput {
        let source = match require::<DatasetSource>(ctx, keys::DATASET) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let DatasetSource::Inline { dataset } = source else {
            return StageOutput::fail("dataset was not materialized by the parsing stage");
        };
        let summary = match require::<DatasetSummary>(ctx, keys::SUMMARY) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let config = match require::<AnalysisConfig>(ctx, keys::CONFIG) {
            Ok(v) => v,
            Err(out) => return out,
        };

        let backend = if config.use_llm {
            self.backend.as_deref()
        } else {
            None
        };
        let report = generate_insights(&dataset, &summary, backend, &config.model_name).await;
        match encode(keys::INSIGHTS, &report) {
            Ok(value) => StageOutput::ok_value(keys::INSIGHTS, value),
            Err(out) => out,
        }
    }
}

/// Renders charts for the numeric columns. Owns the `visuals` field.
#[derive(Debug, Clone, Default)]
pub struct VisualStage;

#[async_trait]
impl Stage for VisualStage {
    fn name(&self) -> &str {
        VISUALIZATION
    }

    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput {
        let source = match require::<DatasetSource>(ctx, keys::DATASET) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let DatasetSource::Inline { dataset } = source else {
            return StageOutput::fail("dataset was not materialized by the parsing stage");
        };
        let config = match require::<AnalysisConfig>(ctx, keys::CONFIG) {
            Ok(v) => v,
            Err(out) => return out,
        };

        let charts_dir = config.output_dir.join("visuals");
        match render_visuals(&dataset, Some(&charts_dir), config.save_images) {
            Ok(bundle) => match encode(keys::VISUALS, &bundle) {
                Ok(value) => StageOutput::ok_value(keys::VISUALS, value),
                Err(out) => out,
            },
            Err(err) => StageOutput::fail(err.to_string()),
        }
    }
}

/// Assembles the final document. Owns the `report_path` field.
#[derive(Debug, Clone, Default)]
pub struct ReportStage;

#[async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &str {
        REPORT_GENERATOR
    }

    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput {
        let summary = match require::<DatasetSummary>(ctx, keys::SUMMARY) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let insights = match require::<InsightReport>(ctx, keys::INSIGHTS) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let visuals = match require::<VisualBundle>(ctx, keys::VISUALS) {
            Ok(v) => v,
            Err(out) => return out,
        };
        let config = match require::<AnalysisConfig>(ctx, keys::CONFIG) {
            Ok(v) => v,
            Err(out) => return out,
        };

        let output_path = config.output_dir.join("data_analysis_report.html");
        match write_report(&summary, &insights, &visuals, &output_path) {
            Ok(path) => StageOutput::ok_value(
                keys::REPORT_PATH,
                serde_json::Value::String(path.display().to_string()),
            ),
            Err(err) => StageOutput::fail(err.to_string()),
        }
    }
}

/// Builds and compiles the four-stage analysis chain.
///
/// `data_parser -> insight_generator -> visualization -> report_generator`,
/// with `data_parser` as the entry stage.
///
/// # Errors
///
/// Construction and compile errors here would indicate a bug in this module,
/// but they are propagated rather than unwrapped.
pub fn build_analysis_graph(
    backend: Option<Arc<dyn InsightBackend>>,
) -> Result<CompiledPlan, AnalystError> {
    let mut insight_stage = InsightStage::new();
    if let Some(backend) = backend {
        insight_stage = insight_stage.with_backend(backend);
    }

    let plan = GraphBuilder::new("analysis")
        .register_stage(DATA_PARSER, Arc::new(ParseStage))?
        .register_stage(INSIGHT_GENERATOR, Arc::new(insight_stage))?
        .register_stage(VISUALIZATION, Arc::new(VisualStage))?
        .register_stage(REPORT_GENERATOR, Arc::new(ReportStage))?
        .add_edge(DATA_PARSER, INSIGHT_GENERATOR)
        .add_edge(INSIGHT_GENERATOR, VISUALIZATION)
        .add_edge(VISUALIZATION, REPORT_GENERATOR)
        .add_edge(REPORT_GENERATOR, END)
        .set_entry(DATA_PARSER)?
        .compile()?;
    Ok(plan)
}

/// Chooses the generation backend for a configuration.
#[cfg(feature = "llm")]
fn backend_for(config: &AnalysisConfig) -> Option<Arc<dyn InsightBackend>> {
    use crate::collaborators::insights::ChatCompletionsBackend;

    if !config.use_llm {
        return None;
    }
    let api_key = config.api_key.as_deref()?;
    Some(Arc::new(ChatCompletionsBackend::groq(
        api_key,
        config.model_name.clone(),
    )))
}

#[cfg(not(feature = "llm"))]
fn backend_for(_config: &AnalysisConfig) -> Option<Arc<dyn InsightBackend>> {
    None
}

/// Runs the full analysis pipeline against a dataset source.
///
/// Seeds a fresh context with the source and configuration, executes the
/// compiled chain, and returns the final context with `summary`, `insights`,
/// `visuals`, and `report_path` populated.
///
/// # Errors
///
/// Returns the first stage failure, or construction/compile errors for an
/// invalid graph.
pub async fn run_analysis(
    source: DatasetSource,
    config: AnalysisConfig,
) -> Result<AnalysisContext, AnalystError> {
    let plan = build_analysis_graph(backend_for(&config))?;

    let mut ctx = AnalysisContext::new()
        .with_field(keys::DATASET, serde_json::to_value(&source)?)
        .with_field(keys::CONFIG, serde_json::to_value(&config)?);

    Executor::new()
        .with_event_sink(Arc::new(LoggingEventSink::info()))
        .run(&plan, &mut ctx)
        .await?;
    Ok(ctx)
}

/// Convenience for tests and embedders that already hold a table.
///
/// # Errors
///
/// Same as [`run_analysis`].
pub async fn run_analysis_on(
    dataset: Dataset,
    config: AnalysisConfig,
) -> Result<AnalysisContext, AnalystError> {
    run_analysis(dataset.into(), config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn graph_compiles_to_the_reference_chain() {
        let plan = build_analysis_graph(None).unwrap();
        assert_eq!(plan.name(), "analysis");
        assert_eq!(
            plan.execution_order(),
            vec![DATA_PARSER, INSIGHT_GENERATOR, VISUALIZATION, REPORT_GENERATOR]
        );
    }

    #[tokio::test]
    async fn parse_stage_fails_without_dataset_field() {
        let ctx = AnalysisContext::new();
        let output = ParseStage.execute(&ctx).await;
        assert!(output.is_failure());
        assert!(output.error.unwrap().contains(keys::DATASET));
    }

    #[tokio::test]
    async fn insight_stage_requires_materialized_dataset() {
        let config = AnalysisConfig::default();
        let source = DatasetSource::Path {
            path: "never_read.csv".into(),
        };
        let ctx = AnalysisContext::new()
            .with_field(keys::DATASET, serde_json::to_value(&source).unwrap())
            .with_field(keys::CONFIG, serde_json::to_value(&config).unwrap())
            .with_field(keys::SUMMARY, serde_json::json!({}));

        let output = InsightStage::new().execute(&ctx).await;
        assert!(output.is_failure());
        assert!(output.error.unwrap().contains("not materialized"));
    }
}
