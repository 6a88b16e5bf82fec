//! Result types: the structured analysis and per-request statistics.
//!
//! [`StructuredAnalysisResult`] serialises in the camelCase shape the prompt
//! asks the model for, so the same type both validates the model's answer
//! and produces the `data` field of the HTTP response.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The validated analysis of one earnings-call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAnalysisResult {
    #[serde(default, deserialize_with = "non_blank")]
    pub company_name: Option<String>,

    #[serde(default, deserialize_with = "non_blank")]
    pub report_period: Option<String>,

    pub management_tone: ManagementTone,

    #[serde(default, deserialize_with = "list_or_null")]
    pub key_positives: Vec<KeyPoint>,

    #[serde(default, deserialize_with = "list_or_null")]
    pub key_concerns: Vec<KeyPoint>,

    #[serde(default, deserialize_with = "object_or_null")]
    pub forward_guidance: ForwardGuidance,

    #[serde(default, deserialize_with = "non_blank")]
    pub capacity_utilization: Option<String>,

    #[serde(default, deserialize_with = "list_or_null")]
    pub growth_initiatives: Vec<GrowthInitiative>,

    #[serde(default, deserialize_with = "list_or_null")]
    pub notable_quotes: Vec<String>,
}

impl StructuredAnalysisResult {
    /// Drop blank list entries so no placeholder survives into the output.
    ///
    /// Blank scalar strings are already mapped to `None` during
    /// deserialisation.
    pub fn normalize(mut self) -> Self {
        self.key_positives.retain(|p| !p.is_blank());
        self.key_concerns.retain(|p| !p.is_blank());
        self.growth_initiatives.retain(|g| !g.is_blank());
        self.notable_quotes.retain(|q| !q.trim().is_empty());
        self
    }
}

/// Management's tone as assessed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementTone {
    #[serde(default)]
    pub overall: Option<Tone>,

    #[serde(default)]
    pub confidence_level: Option<ConfidenceLevel>,

    #[serde(default, deserialize_with = "non_blank")]
    pub reasoning: Option<String>,
}

/// Overall tone. Values outside the four known ones are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    Optimistic,
    Cautious,
    Neutral,
    Pessimistic,
    Unrecognized(String),
}

impl From<String> for Tone {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Tone::Optimistic,
            "cautious" => Tone::Cautious,
            "neutral" => Tone::Neutral,
            "pessimistic" => Tone::Pessimistic,
            _ => Tone::Unrecognized(s),
        }
    }
}

impl From<Tone> for String {
    fn from(t: Tone) -> Self {
        match t {
            Tone::Optimistic => "optimistic".into(),
            Tone::Cautious => "cautious".into(),
            Tone::Neutral => "neutral".into(),
            Tone::Pessimistic => "pessimistic".into(),
            Tone::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// Confidence of management's statements. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Unrecognized(String),
}

impl From<String> for ConfidenceLevel {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => ConfidenceLevel::High,
            "medium" => ConfidenceLevel::Medium,
            "low" => ConfidenceLevel::Low,
            _ => ConfidenceLevel::Unrecognized(s),
        }
    }
}

impl From<ConfidenceLevel> for String {
    fn from(c: ConfidenceLevel) -> Self {
        match c {
            ConfidenceLevel::High => "high".into(),
            ConfidenceLevel::Medium => "medium".into(),
            ConfidenceLevel::Low => "low".into(),
            ConfidenceLevel::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// A headline plus supporting detail, used for positives and concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    #[serde(default, deserialize_with = "non_blank")]
    pub point: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub detail: Option<String>,
}

impl KeyPoint {
    fn is_blank(&self) -> bool {
        self.point.is_none() && self.detail.is_none()
    }
}

/// Forward-looking guidance by topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardGuidance {
    #[serde(default, deserialize_with = "non_blank")]
    pub revenue: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub margin: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub capex: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub other_guidance: Option<String>,
}

/// A growth initiative named by management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthInitiative {
    #[serde(default, deserialize_with = "non_blank")]
    pub initiative: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub description: Option<String>,
}

impl GrowthInitiative {
    fn is_blank(&self) -> bool {
        self.initiative.is_none() && self.description.is_none()
    }
}

/// Timing and volume statistics for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the PDF.
    pub page_count: usize,
    /// Characters of extracted text sent to the model.
    pub extracted_chars: usize,
    /// Text runs whose bytes had to be passed through undecoded.
    pub fallback_runs: usize,
    /// Prompt tokens reported by the provider.
    pub prompt_tokens: usize,
    /// Completion tokens reported by the provider.
    pub completion_tokens: usize,
    /// Wall-clock time for text extraction.
    pub extract_duration_ms: u64,
    /// Wall-clock time for the model call, retries included.
    pub model_duration_ms: u64,
    /// Wall-clock time for the whole request.
    pub total_duration_ms: u64,
}

/// Successful output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub result: StructuredAnalysisResult,
    pub stats: AnalysisStats,
}

// ── Deserialisation helpers ──────────────────────────────────────────────

/// `null`, missing and blank strings all become `None`.
fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn list_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn object_or_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
