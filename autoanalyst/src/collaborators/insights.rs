//! Insight generation: rule-based findings with an optional LLM narrative.

use super::parser::DatasetSummary;
use super::table::{self, Dataset};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How an insight report was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InsightMethod {
    /// Deterministic findings computed from the data.
    RuleBased,
    /// Narrative text generated by a model.
    Llm {
        /// The model that produced the narrative.
        model: String,
    },
}

/// The insight payload produced by the insight stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    /// How the report was produced.
    pub method: InsightMethod,
    /// Individual findings.
    pub bullets: Vec<String>,
    /// Free-form narrative, when a backend produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// A text-generation backend for insight narratives.
///
/// Implementations wrap whatever service turns a dataset summary into prose.
/// Backend failures are expected and survivable; callers degrade to the
/// rule-based findings instead of aborting the run.
#[async_trait]
pub trait InsightBackend: Send + Sync {
    /// Generates narrative text for a dataset summary.
    async fn generate(&self, summary: &DatasetSummary) -> Result<String, CollaboratorError>;
}

/// Computes deterministic findings from the dataset and its summary.
#[must_use]
pub fn rule_based_insights(dataset: &Dataset, summary: &DatasetSummary) -> Vec<String> {
    let mut bullets = Vec::new();
    bullets.push(format!(
        "The dataset has {} rows and {} columns.",
        summary.num_rows, summary.num_columns
    ));

    if let Some((name, pct)) = summary
        .missing_percentage
        .iter()
        .filter(|(_, pct)| **pct > 0.0)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
    {
        bullets.push(format!(
            "Column '{name}' has the most missing data ({pct:.1}% of rows)."
        ));
    } else {
        bullets.push("No missing values were found.".to_string());
    }

    let numeric = dataset.numeric_columns();
    if numeric.is_empty() {
        bullets.push("No numeric columns were detected.".to_string());
        return bullets;
    }

    let mut strongest: Option<(String, String, f64)> = None;
    for (i, (name_a, values_a)) in numeric.iter().enumerate() {
        for (name_b, values_b) in numeric.iter().skip(i + 1) {
            if let Some(r) = table::pearson(values_a, values_b) {
                let stronger = strongest
                    .as_ref()
                    .map_or(true, |(_, _, best)| r.abs() > best.abs());
                if stronger {
                    strongest = Some((name_a.clone(), name_b.clone(), r));
                }
            }
        }
    }
    if let Some((a, b, r)) = strongest {
        bullets.push(format!(
            "The strongest correlation is between '{a}' and '{b}' (r = {r:.2})."
        ));
    }

    for (name, values) in &numeric {
        if let (Some(mean), Some(median), Some(std)) = (
            table::mean(values),
            table::quantile(values, 0.5),
            table::std_dev(values),
        ) {
            if std > 0.0 && (mean - median).abs() > 0.5 * std {
                let direction = if mean > median { "right" } else { "left" };
                bullets.push(format!(
                    "Column '{name}' looks {direction}-skewed (mean {mean:.2} vs median {median:.2})."
                ));
            }
        }
    }

    bullets
}

/// Generates the insight payload for a dataset.
///
/// When a backend is supplied its narrative is attached to the report; if the
/// backend fails the error is logged and the report degrades to the
/// rule-based findings alone. This function therefore never fails the run.
pub async fn generate_insights(
    dataset: &Dataset,
    summary: &DatasetSummary,
    backend: Option<&dyn InsightBackend>,
    model_name: &str,
) -> InsightReport {
    let bullets = rule_based_insights(dataset, summary);

    if let Some(backend) = backend {
        match backend.generate(summary).await {
            Ok(narrative) => {
                info!(model = %model_name, "insight narrative generated");
                return InsightReport {
                    method: InsightMethod::Llm {
                        model: model_name.to_string(),
                    },
                    bullets,
                    narrative: Some(narrative),
                };
            }
            Err(err) => {
                warn!(error = %err, "insight backend failed; falling back to rule-based findings");
            }
        }
    }

    InsightReport {
        method: InsightMethod::RuleBased,
        bullets,
        narrative: None,
    }
}

/// An OpenAI-compatible chat-completions backend (Groq and friends).
#[cfg(feature = "llm")]
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[cfg(feature = "llm")]
impl ChatCompletionsBackend {
    /// The Groq API endpoint.
    pub const GROQ_BASE_URL: &'static str = "https://api.groq.com/openai/v1";

    /// Creates a backend against the Groq endpoint.
    #[must_use]
    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(Self::GROQ_BASE_URL, api_key, model)
    }

    /// Creates a backend against any OpenAI-compatible endpoint.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn prompt(summary: &DatasetSummary) -> String {
        let stats = serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
        format!(
            "You are a data analyst. Given the dataset summary below, write a \
             short narrative (3-5 sentences) of the most important patterns, \
             risks, and follow-up questions.\n\n{stats}"
        )
    }
}

#[cfg(feature = "llm")]
#[async_trait]
impl InsightBackend for ChatCompletionsBackend {
    async fn generate(&self, summary: &DatasetSummary) -> Result<String, CollaboratorError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": Self::prompt(summary)}
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(format!(
                "backend returned HTTP {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::backend(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::backend("response had no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::parser::{parse_dataset, ParseOptions};
    use crate::collaborators::table::DatasetSource;
    use pretty_assertions::assert_eq;

    fn parsed(csv: &str) -> (Dataset, DatasetSummary) {
        let source: DatasetSource = Dataset::parse_csv(csv).unwrap().into();
        parse_dataset(&source, &ParseOptions::default()).unwrap()
    }

    #[derive(Debug)]
    struct CannedBackend(&'static str);

    #[async_trait]
    impl InsightBackend for CannedBackend {
        async fn generate(&self, _summary: &DatasetSummary) -> Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Debug)]
    struct DownBackend;

    #[async_trait]
    impl InsightBackend for DownBackend {
        async fn generate(&self, _summary: &DatasetSummary) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::backend("connection refused"))
        }
    }

    #[test]
    fn rule_based_reports_shape_and_correlation() {
        let (dataset, summary) = parsed("x,y\n1,2\n2,4\n3,6\n4,8\n");
        let bullets = rule_based_insights(&dataset, &summary);

        assert!(bullets[0].contains("4 rows and 2 columns"));
        assert!(bullets.iter().any(|b| b.contains("No missing values")));
        assert!(bullets
            .iter()
            .any(|b| b.contains("'x' and 'y'") && b.contains("1.00")));
    }

    #[test]
    fn rule_based_flags_missing_hotspot() {
        let (dataset, summary) = parsed("a,b\n1,x\n,y\n,z\n");
        let bullets = rule_based_insights(&dataset, &summary);
        assert!(bullets.iter().any(|b| b.contains("'a'") && b.contains("66.7%")));
    }

    #[test]
    fn rule_based_handles_non_numeric_data() {
        let (dataset, summary) = parsed("name\nalice\nbob\n");
        let bullets = rule_based_insights(&dataset, &summary);
        assert!(bullets.iter().any(|b| b.contains("No numeric columns")));
    }

    #[tokio::test]
    async fn backend_narrative_is_attached() {
        let (dataset, summary) = parsed("x\n1\n2\n");
        let backend = CannedBackend("A tidy little dataset.");
        let report =
            generate_insights(&dataset, &summary, Some(&backend), "llama-3.1-8b-instant").await;

        assert_eq!(
            report.method,
            InsightMethod::Llm {
                model: "llama-3.1-8b-instant".to_string()
            }
        );
        assert_eq!(report.narrative.as_deref(), Some("A tidy little dataset."));
        assert!(!report.bullets.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_rule_based() {
        let (dataset, summary) = parsed("x\n1\n2\n");
        let report = generate_insights(&dataset, &summary, Some(&DownBackend), "any").await;

        assert_eq!(report.method, InsightMethod::RuleBased);
        assert!(report.narrative.is_none());
        assert!(!report.bullets.is_empty());
    }

    #[tokio::test]
    async fn no_backend_is_rule_based() {
        let (dataset, summary) = parsed("x\n1\n2\n");
        let report = generate_insights(&dataset, &summary, None, "unused").await;
        assert_eq!(report.method, InsightMethod::RuleBased);
    }
}
