//! Stage trait and stage output types.
//!
//! A stage is a named unit of pipeline work: a function from a subset of
//! context fields to a partial update of context fields.

use crate::context::{AnalysisContext, ContextUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The status of a stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The stage completed and its update should be merged.
    Ok,
    /// The stage declined to run; nothing is merged and the run continues.
    Skip,
    /// The stage failed; the run halts immediately.
    Fail,
}

impl StageStatus {
    /// Returns true if the status allows the run to continue.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Skip)
    }

    /// Returns true if the status halts the run.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }
}

/// The output of a stage execution.
///
/// Immutable once created; factory methods cover the three statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The execution status.
    pub status: StageStatus,

    /// The partial context update (for successful executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ContextUpdate>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Skip reason (for skipped executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::ok_empty()
    }
}

impl StageOutput {
    /// Creates a successful output with a partial update.
    #[must_use]
    pub fn ok(data: ContextUpdate) -> Self {
        Self {
            status: StageStatus::Ok,
            data: Some(data),
            error: None,
            skip_reason: None,
        }
    }

    /// Creates a successful output with no update.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            status: StageStatus::Ok,
            data: None,
            error: None,
            skip_reason: None,
        }
    }

    /// Creates a successful output carrying a single field.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = ContextUpdate::new();
        data.insert(key.into(), value);
        Self::ok(data)
    }

    /// Creates a skip output with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skip,
            data: None,
            error: None,
            skip_reason: Some(reason.into()),
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            data: None,
            error: Some(error.into()),
            skip_reason: None,
        }
    }

    /// Returns true if the output allows the run to continue.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output halts the run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns the update, or an empty one if none was produced.
    #[must_use]
    pub fn data_or_empty(&self) -> ContextUpdate {
        self.data.clone().unwrap_or_default()
    }

    /// Gets a value from the update.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}

/// Trait for pipeline stages.
///
/// Stages are registered into a graph by name, are immutable after
/// registration, and may be executed across multiple runs of a compiled plan.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage against the current context.
    ///
    /// The stage reads whatever fields it needs and returns a partial update;
    /// it never mutates the context directly.
    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput;
}

/// A closure-backed stage.
pub struct FnStage<F>
where
    F: Fn(&AnalysisContext) -> StageOutput + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&AnalysisContext) -> StageOutput + Send + Sync,
{
    /// Creates a new closure-backed stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&AnalysisContext) -> StageOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&AnalysisContext) -> StageOutput + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &AnalysisContext) -> StageOutput {
        (self.func)(ctx)
    }
}

/// A stage that does nothing, for tests and placeholders.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &AnalysisContext) -> StageOutput {
        StageOutput::ok_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_classification() {
        assert!(StageStatus::Ok.is_success());
        assert!(StageStatus::Skip.is_success());
        assert!(StageStatus::Fail.is_failure());
        assert!(!StageStatus::Fail.is_success());
    }

    #[test]
    fn fail_output_carries_error() {
        let output = StageOutput::fail("backend unreachable");
        assert!(output.is_failure());
        assert_eq!(output.error.as_deref(), Some("backend unreachable"));
        assert!(output.data.is_none());
    }

    #[test]
    fn ok_value_roundtrip() {
        let output = StageOutput::ok_value("summary", json!({"rows": 10}));
        assert!(output.is_success());
        assert_eq!(output.get("summary"), Some(&json!({"rows": 10})));
        assert_eq!(output.data_or_empty().len(), 1);
    }

    #[tokio::test]
    async fn fn_stage_executes_closure() {
        let stage = FnStage::new("double", |ctx: &AnalysisContext| {
            let n = ctx.get_as::<i64>("n").unwrap_or(0);
            StageOutput::ok_value("n", json!(n * 2))
        });
        assert_eq!(stage.name(), "double");

        let ctx = AnalysisContext::new().with_field("n", json!(21));
        let output = stage.execute(&ctx).await;
        assert_eq!(output.get("n"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn noop_stage_produces_nothing() {
        let stage = NoOpStage::new("noop");
        let output = stage.execute(&AnalysisContext::new()).await;
        assert!(output.is_success());
        assert!(output.data.is_none());
    }
}
