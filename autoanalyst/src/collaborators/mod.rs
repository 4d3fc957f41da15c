//! External collaborators invoked by the reference pipeline stages.
//!
//! Each collaborator is a narrow function with an explicit `Result` boundary;
//! the orchestration engine never imports anything from this module.

pub mod insights;
pub mod parser;
pub mod report;
pub mod table;
pub mod visuals;

pub use insights::{generate_insights, InsightBackend, InsightMethod, InsightReport};
pub use parser::{parse_dataset, ColumnStats, DatasetSummary, ParseOptions};
pub use report::write_report;
pub use table::{ColumnType, Dataset, DatasetSource};
pub use visuals::{render_visuals, VisualBundle, NO_NUMERIC_COLUMNS};

#[cfg(feature = "llm")]
pub use insights::ChatCompletionsBackend;
