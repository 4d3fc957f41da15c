//! Error taxonomy for the autoanalyst pipeline engine.
//!
//! Errors fall into three families: construction errors (raised while the
//! graph is being declared), compile errors (raised when the declarations are
//! validated and frozen into a plan), and stage execution errors (raised while
//! a run is in flight). Construction and compile errors indicate a programming
//! mistake in pipeline assembly; execution errors indicate a collaborator
//! failed against real data.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for autoanalyst operations.
#[derive(Debug, Error)]
pub enum AnalystError {
    /// Graph construction failed.
    #[error("{0}")]
    Construction(#[from] ConstructionError),

    /// Graph compilation failed.
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// A stage failed during execution.
    #[error("{0}")]
    StageExecution(#[from] StageExecutionError),

    /// A collaborator failed outside of a pipeline run.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while declaring stages and edges on a [`GraphBuilder`].
///
/// [`GraphBuilder`]: crate::graph::GraphBuilder
#[derive(Debug, Clone, Error)]
pub enum ConstructionError {
    /// A stage name was registered twice.
    #[error("stage '{name}' is already registered")]
    DuplicateStage {
        /// The conflicting stage name.
        name: String,
    },

    /// A stage name was referenced but never registered.
    #[error("stage '{name}' is not registered")]
    UnknownStage {
        /// The unknown stage name.
        name: String,
    },
}

impl ConstructionError {
    /// Creates a duplicate-stage error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateStage { name: name.into() }
    }

    /// Creates an unknown-stage error.
    #[must_use]
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownStage { name: name.into() }
    }
}

/// Errors raised when a builder's declarations are validated into a plan.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// No entry stage was designated.
    #[error("no entry stage designated for pipeline '{pipeline}'")]
    MissingEntry {
        /// The pipeline name.
        pipeline: String,
    },

    /// An edge references a stage name that was never registered.
    #[error("edge '{from}' -> '{to}' references an unregistered stage")]
    DanglingEdge {
        /// The edge source.
        from: String,
        /// The edge target.
        to: String,
    },

    /// A stage declares more than one outgoing edge.
    #[error("stage '{stage}' has more than one outgoing edge; the plan must be a single chain")]
    ConflictingEdges {
        /// The offending stage.
        stage: String,
    },

    /// A stage was revisited before the terminal sentinel was reached.
    #[error("cycle detected in pipeline: {}", path.join(" -> "))]
    Cycle {
        /// The stage path that closes the cycle.
        path: Vec<String>,
    },

    /// Following edges from the entry never reaches the terminal sentinel.
    #[error("pipeline never reaches the terminal sentinel; walk stalled at stage '{stalled_at}'")]
    UnreachableTerminal {
        /// The last stage reached before the walk stalled.
        stalled_at: String,
    },
}

/// Error raised when a stage fails during a run.
///
/// Wraps the collaborator failure with the name of the originating stage so
/// the caller can attribute the fault without inspecting the context.
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed: {message}")]
pub struct StageExecutionError {
    /// The stage that failed.
    pub stage: String,
    /// The underlying failure message.
    pub message: String,
}

impl StageExecutionError {
    /// Creates a new stage execution error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced at the collaborator boundary.
///
/// Collaborators return explicit results instead of catching failures
/// internally, so the executor's fail-fast policy has a single signal to act
/// on.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// A dataset path does not exist.
    #[error("dataset not found: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The dataset could not be parsed.
    #[error("failed to parse dataset: {reason}")]
    Parse {
        /// Why parsing failed.
        reason: String,
    },

    /// A chart or document could not be rendered.
    #[error("failed to render {what}: {reason}")]
    Render {
        /// What was being rendered.
        what: String,
        /// Why rendering failed.
        reason: String,
    },

    /// A generation backend was unreachable or returned an invalid response.
    #[error("insight backend error: {reason}")]
    Backend {
        /// Why the backend call failed.
        reason: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a render error.
    #[must_use]
    pub fn render(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_messages() {
        let err = ConstructionError::duplicate("data_parser");
        assert_eq!(err.to_string(), "stage 'data_parser' is already registered");

        let err = ConstructionError::unknown("missing");
        assert_eq!(err.to_string(), "stage 'missing' is not registered");
    }

    #[test]
    fn cycle_error_joins_path() {
        let err = CompileError::Cycle {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn stage_execution_error_attributes_stage() {
        let err = StageExecutionError::new("visualization", "render failed");
        assert_eq!(err.stage, "visualization");
        assert!(err.to_string().contains("'visualization'"));
    }

    #[test]
    fn analyst_error_from_compile() {
        let err: AnalystError = CompileError::MissingEntry {
            pipeline: "analysis".to_string(),
        }
        .into();
        assert!(err.to_string().contains("no entry stage"));
    }
}
