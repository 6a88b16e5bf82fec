//! Post-processing: turn raw model text into a validated analysis.
//!
//! Even when told not to, models sometimes wrap their JSON in
//! ` ```json ... ``` ` fences, or open a fence and never close it. We strip
//! one leading and one trailing fence marker, parse what remains, and check
//! its shape. Nothing is repaired: text that is not JSON after stripping is a
//! format error.
//!
//! ## Validation contract
//!
//! * The value must be a JSON object carrying every key in [`REQUIRED_FIELDS`].
//! * Optional fields may be `null`; `null` lists are read as empty.
//! * `managementTone.overall` / `confidenceLevel` outside their enumerations
//!   are accepted verbatim and logged. Compliance is the model's best effort.
//! * Extra keys are ignored.

use crate::error::AnalysisError;
use crate::output::{ConfidenceLevel, StructuredAnalysisResult, Tone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

/// Top-level keys every model answer must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "companyName",
    "reportPeriod",
    "managementTone",
    "keyPositives",
    "keyConcerns",
    "forwardGuidance",
    "capacityUtilization",
    "growthInitiatives",
    "notableQuotes",
];

/// Strip fences, parse and validate raw model output.
pub fn parse_analysis(raw: &str) -> Result<StructuredAnalysisResult, AnalysisError> {
    let cleaned = strip_fences(raw);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        error!("JSON parse failed ({}); raw model output: {}", e, raw);
        AnalysisError::InvalidJson {
            detail: e.to_string(),
        }
    })?;

    validate_analysis(value)
}

/// Validate an already-parsed JSON value.
pub fn validate_analysis(value: Value) -> Result<StructuredAnalysisResult, AnalysisError> {
    let Some(object) = value.as_object() else {
        return Err(AnalysisError::SchemaMismatch {
            detail: format!("expected a JSON object, got {}", json_type(&value)),
        });
    };

    if let Some(field) = REQUIRED_FIELDS
        .iter()
        .copied()
        .find(|f| !object.contains_key(*f)) {
        return Err(AnalysisError::MissingField { field });
    }

    let result: StructuredAnalysisResult =
        serde_json::from_value(value).map_err(|e| AnalysisError::SchemaMismatch {
            detail: e.to_string(),
        })?;

    if let Some(Tone::Unrecognized(ref v)) = result.management_tone.overall {
        warn!("managementTone.overall outside enumeration: {:?}", v);
    }
    if let Some(ConfidenceLevel::Unrecognized(ref v)) = result.management_tone.confidence_level {
        warn!("managementTone.confidenceLevel outside enumeration: {:?}", v);
    }

    Ok(result.normalize())
}

// ── Fence stripping ─────────────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?\s*").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*$").unwrap());

/// Remove one leading and one trailing code-fence marker, then trim.
///
/// Idempotent: already-clean text comes back unchanged (apart from
/// surrounding whitespace).
pub fn strip_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = match RE_LEADING_FENCE.find(s) {
        Some(m) => &s[m.end()..],
        None => s,
    };
    let s = match RE_TRAILING_FENCE.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    };
    s.trim()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
