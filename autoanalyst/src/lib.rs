//! # Autoanalyst
//!
//! An automated data-analysis pipeline: parse a dataset, derive insights,
//! render visualizations, and assemble a report.
//!
//! The interesting part is the orchestration engine, not any single stage:
//!
//! - **Graph builder**: declare named stages and the edges between them
//! - **Compiler**: validate the declarations and freeze them into a plan
//! - **Executor**: walk the plan, merging each stage's partial update into a
//!   shared context and halting on the first failure
//!
//! The domain stages (parsing, insights, charts, report) live behind narrow
//! collaborator functions and are swappable in tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autoanalyst::prelude::*;
//!
//! let plan = GraphBuilder::new("analysis")
//!     .register_stage("parse", Arc::new(ParseStage))?
//!     .add_edge("parse", END)
//!     .set_entry("parse")?
//!     .compile()?;
//!
//! let mut ctx = AnalysisContext::new();
//! let report = Executor::new().run(&plan, &mut ctx).await?;
//! ```
//!
//! Or run the whole reference chain in one call:
//!
//! ```rust,ignore
//! let ctx = autoanalyst::pipeline::run_analysis(source, AnalysisConfig::from_env()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod collaborators;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod stage;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collaborators::{
        Dataset, DatasetSource, DatasetSummary, InsightReport, VisualBundle,
    };
    pub use crate::config::AnalysisConfig;
    pub use crate::context::{keys, AnalysisContext, ContextUpdate, RunIdentity};
    pub use crate::errors::{
        AnalystError, CollaboratorError, CompileError, ConstructionError, StageExecutionError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{CompiledPlan, Executor, RunReport, RunState};
    pub use crate::graph::{GraphBuilder, END};
    pub use crate::pipeline::{
        build_analysis_graph, run_analysis, InsightStage, ParseStage, ReportStage, VisualStage,
    };
    pub use crate::stage::{FnStage, NoOpStage, Stage, StageOutput, StageStatus};
}
