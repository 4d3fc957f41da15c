//! Compiled plans and their sequential execution.

use crate::context::{AnalysisContext, RunIdentity};
use crate::errors::StageExecutionError;
use crate::events::{EventSink, NoOpEventSink};
use crate::stage::{Stage, StageStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The validated, ordered, immutable sequence of stages ready for execution.
///
/// A plan owns no mutable state and may be executed any number of times;
/// each run supplies its own context.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    name: String,
    stages: Vec<(String, Arc<dyn Stage>)>,
}

impl CompiledPlan {
    pub(crate) fn new(name: String, stages: Vec<(String, Arc<dyn Stage>)>) -> Self {
        Self { name, stages }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages in the plan.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// The state of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// No stage has started yet.
    NotStarted,
    /// The named stage is currently executing.
    Running {
        /// The in-flight stage.
        stage: String,
    },
    /// Every stage completed and the terminal sentinel was reached.
    Completed,
    /// The named stage failed and the run halted.
    Failed {
        /// The stage that failed.
        stage: String,
    },
}

impl RunState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// Per-stage timing recorded during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    /// The stage name.
    pub stage: String,
    /// How long the stage ran, in milliseconds.
    pub duration_ms: f64,
}

/// The result of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identity of the run.
    pub run: RunIdentity,
    /// The terminal state (always [`RunState::Completed`] on the happy path).
    pub state: RunState,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Per-stage timings in execution order.
    pub timings: Vec<StageTiming>,
}

/// Walks a compiled plan from the entry stage to the terminal sentinel.
///
/// Execution is strictly sequential: each stage is awaited to completion and
/// its update merged into the context before the next stage starts. The
/// context is exclusively owned by the in-flight run, so no locking is
/// involved. On the first failure the executor halts, leaving the context
/// with exactly the updates of the stages that completed beforehand.
pub struct Executor {
    sink: Arc<dyn EventSink>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Creates an executor that discards events.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink used for run observability.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs a compiled plan against the caller's context.
    ///
    /// The caller keeps ownership of the context; on failure it reflects the
    /// updates of every stage that completed strictly before the failing one.
    /// `stage.started` and `stage.failed` events carry the current
    /// [`RunState`] in their payload.
    ///
    /// # Errors
    ///
    /// Returns a [`StageExecutionError`] attributing the first stage that
    /// failed.
    pub async fn run(
        &self,
        plan: &CompiledPlan,
        ctx: &mut AnalysisContext,
    ) -> Result<RunReport, StageExecutionError> {
        let run = RunIdentity::new();
        let start = Instant::now();
        let mut timings = Vec::with_capacity(plan.stage_count());
        let mut state = RunState::NotStarted;

        info!(
            pipeline = %plan.name(),
            run_id = %run.run_id,
            stages = plan.stage_count(),
            state = ?state,
            "pipeline run started"
        );

        for (name, runner) in &plan.stages {
            state = RunState::Running {
                stage: name.clone(),
            };
            self.sink
                .emit(
                    "stage.started",
                    Some(serde_json::json!({ "stage": name, "state": state })),
                )
                .await;

            let stage_start = Instant::now();
            let output = runner.execute(ctx).await;
            let duration_ms = stage_start.elapsed().as_secs_f64() * 1000.0;
            timings.push(StageTiming {
                stage: name.clone(),
                duration_ms,
            });

            match output.status {
                StageStatus::Ok => {
                    ctx.apply(output.data_or_empty());
                    self.sink
                        .emit(
                            "stage.completed",
                            Some(serde_json::json!({
                                "stage": name,
                                "duration_ms": duration_ms,
                            })),
                        )
                        .await;
                }
                StageStatus::Skip => {
                    self.sink
                        .emit(
                            "stage.skipped",
                            Some(serde_json::json!({
                                "stage": name,
                                "reason": output.skip_reason,
                            })),
                        )
                        .await;
                }
                StageStatus::Fail => {
                    let message = output
                        .error
                        .unwrap_or_else(|| "stage reported failure without a message".to_string());
                    state = RunState::Failed {
                        stage: name.clone(),
                    };
                    self.sink
                        .emit(
                            "stage.failed",
                            Some(serde_json::json!({
                                "stage": name,
                                "error": message,
                                "duration_ms": duration_ms,
                                "state": state,
                            })),
                        )
                        .await;
                    warn!(
                        pipeline = %plan.name(),
                        run_id = %run.run_id,
                        stage = %name,
                        error = %message,
                        state = ?state,
                        "pipeline run failed"
                    );
                    return Err(StageExecutionError::new(name, message));
                }
            }
        }

        state = RunState::Completed;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            pipeline = %plan.name(),
            run_id = %run.run_id,
            duration_ms,
            "pipeline run completed"
        );

        Ok(RunReport {
            run,
            state,
            duration_ms,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::graph::{GraphBuilder, END};
    use crate::stage::{FnStage, NoOpStage, StageOutput};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn value_stage(name: &str, key: &'static str, value: serde_json::Value) -> Arc<dyn Stage> {
        Arc::new(FnStage::new(name, move |_ctx: &AnalysisContext| {
            StageOutput::ok_value(key, value.clone())
        }))
    }

    fn failing_stage(name: &str, message: &'static str) -> Arc<dyn Stage> {
        Arc::new(FnStage::new(name, move |_ctx: &AnalysisContext| {
            StageOutput::fail(message)
        }))
    }

    fn plan_of(stages: Vec<(&str, Arc<dyn Stage>)>) -> CompiledPlan {
        let mut builder = GraphBuilder::new("test");
        for (name, runner) in &stages {
            builder = builder.register_stage(*name, Arc::clone(runner)).unwrap();
        }
        let names: Vec<&str> = stages.iter().map(|(n, _)| *n).collect();
        for pair in names.windows(2) {
            builder = builder.add_edge(pair[0], pair[1]);
        }
        builder = builder.add_edge(*names.last().unwrap(), END);
        builder.set_entry(names[0]).unwrap().compile().unwrap()
    }

    #[tokio::test]
    async fn successful_run_merges_union_of_outputs() {
        let plan = plan_of(vec![
            ("first", value_stage("first", "a", json!(1))),
            ("second", value_stage("second", "b", json!(2))),
            // Later stage overwrites an earlier stage's field.
            ("third", value_stage("third", "a", json!(10))),
        ]);

        let mut ctx = AnalysisContext::new();
        let report = Executor::new().run(&plan, &mut ctx).await.unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert!(report.state.is_terminal());
        assert_eq!(report.timings.len(), 3);
        assert_eq!(ctx.get("a"), Some(&json!(10)));
        assert_eq!(ctx.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn failure_halts_and_attributes_the_stage() {
        let plan = plan_of(vec![
            ("first", value_stage("first", "a", json!(1))),
            ("boom", failing_stage("boom", "collaborator exploded")),
            ("after", value_stage("after", "b", json!(2))),
        ]);

        let mut ctx = AnalysisContext::new();
        let err = Executor::new().run(&plan, &mut ctx).await.unwrap_err();

        assert_eq!(err.stage, "boom");
        assert!(err.message.contains("exploded"));
        // Effects of stages before the failure are visible; later stages never ran.
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert!(!ctx.contains("b"));
    }

    #[tokio::test]
    async fn skipped_stage_merges_nothing_and_run_continues() {
        let skip: Arc<dyn Stage> = Arc::new(FnStage::new("middle", |_ctx: &AnalysisContext| {
            StageOutput::skip("nothing to do")
        }));
        let plan = plan_of(vec![
            ("first", value_stage("first", "a", json!(1))),
            ("middle", skip),
            ("last", value_stage("last", "b", json!(2))),
        ]);

        let mut ctx = AnalysisContext::new();
        let report = Executor::new().run(&plan, &mut ctx).await.unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn plan_is_reusable_and_deterministic() {
        let plan = plan_of(vec![
            ("first", value_stage("first", "a", json!([1, 2, 3]))),
            ("second", value_stage("second", "b", json!("done"))),
        ]);

        let seed = AnalysisContext::new().with_field("input", json!(7));
        let mut ctx_a = seed.clone();
        let mut ctx_b = seed;
        Executor::new().run(&plan, &mut ctx_a).await.unwrap();
        Executor::new().run(&plan, &mut ctx_b).await.unwrap();

        assert_eq!(ctx_a, ctx_b);
    }

    #[tokio::test]
    async fn injected_sink_sees_the_full_event_sequence() {
        let sink = Arc::new(RecordingEventSink::new());
        let skip: Arc<dyn Stage> = Arc::new(FnStage::new("middle", |_ctx: &AnalysisContext| {
            StageOutput::skip("nothing to do")
        }));
        let plan = plan_of(vec![
            ("first", value_stage("first", "a", json!(1))),
            ("middle", skip),
            ("boom", failing_stage("boom", "collaborator exploded")),
        ]);

        let mut ctx = AnalysisContext::new();
        let executor = Executor::new().with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
        let err = executor.run(&plan, &mut ctx).await.unwrap_err();
        assert_eq!(err.stage, "boom");

        assert_eq!(
            sink.event_types(),
            vec![
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.skipped",
                "stage.started",
                "stage.failed",
            ]
        );
    }

    #[tokio::test]
    async fn events_carry_the_run_state() {
        let sink = Arc::new(RecordingEventSink::new());
        let plan = plan_of(vec![("boom", failing_stage("boom", "no good"))]);

        let mut ctx = AnalysisContext::new();
        let executor = Executor::new().with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
        executor.run(&plan, &mut ctx).await.unwrap_err();

        let events = sink.events();
        assert_eq!(events.len(), 2);

        let started = events[0].1.as_ref().unwrap();
        let running: RunState = serde_json::from_value(started["state"].clone()).unwrap();
        assert_eq!(
            running,
            RunState::Running {
                stage: "boom".to_string()
            }
        );

        let failed = events[1].1.as_ref().unwrap();
        let terminal: RunState = serde_json::from_value(failed["state"].clone()).unwrap();
        assert_eq!(
            terminal,
            RunState::Failed {
                stage: "boom".to_string()
            }
        );
        assert!(terminal.is_terminal());
    }

    #[tokio::test]
    async fn empty_context_survives_noop_plan() {
        let plan = plan_of(vec![("only", Arc::new(NoOpStage::new("only")) as Arc<dyn Stage>)]);
        let mut ctx = AnalysisContext::new();
        let report = Executor::new().run(&plan, &mut ctx).await.unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert!(ctx.is_empty());
    }
}
