//! Run configuration for the reference analysis pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for an analysis run.
///
/// Seeded into the context under [`keys::CONFIG`] so every stage reads the
/// same snapshot; nothing is read from ambient globals after construction.
///
/// [`keys::CONFIG`]: crate::context::keys::CONFIG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Directory for the cleaned dataset, chart files, and the report.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Whether to ask a generation backend for insight text.
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
    /// Model name passed to the generation backend.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// API key for the generation backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Number of head rows to include in the dataset summary.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    /// Whether to write the cleaned dataset back out as CSV.
    #[serde(default)]
    pub save_clean_copy: bool,
    /// Whether to persist rendered chart files.
    #[serde(default = "default_save_images")]
    pub save_images: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_use_llm() -> bool {
    true
}

fn default_model_name() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_sample_rows() -> usize {
    5
}

fn default_save_images() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            use_llm: default_use_llm(),
            model_name: default_model_name(),
            api_key: None,
            sample_rows: default_sample_rows(),
            save_clean_copy: false,
            save_images: default_save_images(),
        }
    }
}

impl AnalysisConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with defaults, reading the backend API key
    /// from the `GROQ_API_KEY` environment variable.
    ///
    /// This is the only place the crate touches the environment; pass the
    /// result down explicitly.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GROQ_API_KEY").ok(),
            ..Self::default()
        }
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enables or disables backend text generation.
    #[must_use]
    pub fn with_use_llm(mut self, use_llm: bool) -> Self {
        self.use_llm = use_llm;
        self
    }

    /// Sets the backend model name.
    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Sets the backend API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the number of sample rows in the summary.
    #[must_use]
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Enables writing the cleaned dataset as CSV.
    #[must_use]
    pub fn with_save_clean_copy(mut self, save: bool) -> Self {
        self.save_clean_copy = save;
        self
    }

    /// Enables or disables persisting chart files.
    #[must_use]
    pub fn with_save_images(mut self, save: bool) -> Self {
        self.save_images = save;
        self
    }
}
