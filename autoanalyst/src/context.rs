//! The shared analysis context threaded through a pipeline run.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Well-known field names used by the reference analysis pipeline.
///
/// Call sites go through these constants so a typo in a field name is a
/// compile error rather than a silent no-op at run time.
pub mod keys {
    /// The dataset source or cleaned in-memory dataset.
    pub const DATASET: &str = "dataset";
    /// The run configuration.
    pub const CONFIG: &str = "config";
    /// The structured dataset summary.
    pub const SUMMARY: &str = "summary";
    /// The generated insight payload.
    pub const INSIGHTS: &str = "insights";
    /// The rendered visualization bundle.
    pub const VISUALS: &str = "visuals";
    /// The path of the generated report document.
    pub const REPORT_PATH: &str = "report_path";
}

/// A partial update produced by a stage, merged into the context on success.
pub type ContextUpdate = HashMap<String, serde_json::Value>;

/// The mutable, heterogeneous key-value state threaded through a pipeline run.
///
/// A context is created once per run by the caller, mutated additively by each
/// stage (fields are added or overwritten, never removed), and discarded when
/// the run completes or fails. No two runs share a context instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    fields: BTreeMap<String, serde_json::Value>,
}

impl AnalysisContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, consuming and returning the context.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Inserts a field, overwriting any prior value.
    pub fn insert(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(name.into(), value);
    }

    /// Gets a raw field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Gets a field decoded into a typed value.
    ///
    /// Returns `None` both when the field is absent and when it does not
    /// decode into `T`; stages treat either case as a missing input.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.fields
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Checks whether a field is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Merges a stage's partial update with overwrite-on-conflict semantics.
    ///
    /// Fields named in the update replace any prior value; fields not
    /// mentioned are untouched.
    pub fn apply(&mut self, update: ContextUpdate) {
        for (name, value) in update {
            self.fields.insert(name, value);
        }
    }

    /// Returns the field names currently present, in sorted order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the context holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Identifies a single pipeline run for log correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn insert_and_get() {
        let mut ctx = AnalysisContext::new();
        assert!(ctx.is_empty());

        ctx.insert(keys::SUMMARY, json!({"num_rows": 10}));
        assert!(ctx.contains(keys::SUMMARY));
        assert_eq!(ctx.len(), 1);
        assert_eq!(
            ctx.get(keys::SUMMARY),
            Some(&json!({"num_rows": 10}))
        );
    }

    #[test]
    fn apply_overwrites_on_conflict() {
        let mut ctx = AnalysisContext::new().with_field("a", json!(1)).with_field("b", json!(2));

        let mut update = ContextUpdate::new();
        update.insert("b".to_string(), json!(20));
        update.insert("c".to_string(), json!(3));
        ctx.apply(update);

        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), Some(&json!(20)));
        assert_eq!(ctx.get("c"), Some(&json!(3)));
        assert_eq!(ctx.field_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn typed_get_decodes() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Shape {
            rows: usize,
        }

        let ctx = AnalysisContext::new().with_field("shape", json!({"rows": 3}));
        assert_eq!(ctx.get_as::<Shape>("shape"), Some(Shape { rows: 3 }));
        assert_eq!(ctx.get_as::<Shape>("missing"), None);
        // Wrong shape decodes to None, not a panic.
        assert_eq!(ctx.get_as::<Vec<u8>>("shape"), None);
    }

    #[test]
    fn contexts_with_equal_fields_are_equal() {
        let a = AnalysisContext::new().with_field("x", json!([1, 2]));
        let b = AnalysisContext::new().with_field("x", json!([1, 2]));
        assert_eq!(a, b);
    }

    #[test]
    fn run_identity_is_unique() {
        let a = RunIdentity::new();
        let b = RunIdentity::new();
        assert_ne!(a.run_id, b.run_id);
    }
}
