//! The analysis prompt sent to the LLM.
//!
//! Every instruction and the output schema live here so a change to the
//! model's contract is a change to exactly one file. The prompt is a pure
//! function of the extracted text: same text, same prompt.

use crate::pipeline::extract::ExtractedText;

/// Marker placed on the line before the embedded document text.
pub const DOCUMENT_START: &str = "<<<BEGIN DOCUMENT>>>";

/// Marker placed on the line after the embedded document text.
pub const DOCUMENT_END: &str = "<<<END DOCUMENT>>>";

/// Role and rules given to the model ahead of the schema.
pub const ANALYST_INSTRUCTIONS: &str = r#"You are a senior financial research analyst at an institutional investment firm. You have been given an earnings call transcript or a management commentary document. Analyse it with the rigour expected of a professional equity research report.

STRICT RULES:
- Only extract information that is explicitly present in the document.
- If a field is not mentioned, return null for that field. Never guess or fabricate data.
- Judge management tone solely from the language, word choice and framing management uses.
- Notable quotes must be exact, verbatim words from the document.
- Every number, percentage and guidance figure must come directly from the text.
- Do NOT use emoji characters anywhere in the response.
- Do NOT use bullet points, asterisks, markdown or any other formatting characters.
- Write every text field as clean, professional prose suitable for an institutional research report.
- Keep the tone clinical, precise and neutral. Avoid casual language.

Return ONLY a valid JSON object. No explanation, no markdown code fences, no preamble, no commentary: just the raw JSON object starting with { and ending with }."#;

/// The exact output shape the model must follow.
pub const OUTPUT_SCHEMA: &str = r#"{
  "companyName": "string or null",
  "reportPeriod": "string or null (e.g. Q3 FY2024, Investor Day 2025)",
  "managementTone": {
    "overall": "optimistic | cautious | neutral | pessimistic",
    "confidenceLevel": "high | medium | low",
    "reasoning": "One to two sentences of clinical analysis explaining the tone assessment with specific evidence from the document."
  },
  "keyPositives": [
    {
      "point": "Concise headline, 4 to 8 words",
      "detail": "One to two sentences of factual detail with supporting context from the document."
    }
  ],
  "keyConcerns": [
    {
      "point": "Concise headline, 4 to 8 words",
      "detail": "One to two sentences of factual detail with supporting context from the document."
    }
  ],
  "forwardGuidance": {
    "revenue": "Revenue outlook with specific figures if available, or null",
    "margin": "Margin outlook with specific figures if available, or null",
    "capex": "Capital expenditure guidance with specific figures if available, or null",
    "otherGuidance": "Any other forward-looking guidance explicitly stated, or null"
  },
  "capacityUtilization": "Capacity utilization data mentioned in the document, or null if not discussed",
  "growthInitiatives": [
    {
      "initiative": "Name of the initiative",
      "description": "One to two sentences describing what management stated about this initiative."
    }
  ],
  "notableQuotes": [
    "Exact verbatim quote from management, no paraphrasing"
  ]
}"#;

/// Closing reminder placed after the document.
pub const CLOSING_INSTRUCTION: &str = "Return ONLY the JSON object. No other text whatsoever.";

/// A fully assembled prompt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    text: String,
    doc_start: usize,
    doc_end: usize,
}

impl AnalysisPrompt {
    /// The complete prompt text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The document text exactly as embedded between the markers.
    pub fn document(&self) -> &str {
        &self.text[self.doc_start..self.doc_end]
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Build the analysis prompt for a document.
pub fn build_prompt(text: &ExtractedText) -> AnalysisPrompt {
    let document = text.as_str();
    let mut prompt = String::with_capacity(
        ANALYST_INSTRUCTIONS.len() + OUTPUT_SCHEMA.len() + document.len() + 256,
    );

    prompt.push_str(ANALYST_INSTRUCTIONS);
    prompt.push_str("\n\nThe JSON must follow this exact structure:\n\n");
    prompt.push_str(OUTPUT_SCHEMA);
    prompt.push_str("\n\nDOCUMENT TO ANALYZE:\n");
    prompt.push_str(DOCUMENT_START);
    prompt.push('\n');
    let doc_start = prompt.len();
    prompt.push_str(document);
    let doc_end = prompt.len();
    prompt.push('\n');
    prompt.push_str(DOCUMENT_END);
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING_INSTRUCTION);

    AnalysisPrompt {
        text: prompt,
        doc_start,
        doc_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ExtractedText {
        ExtractedText::new(s.to_string(), 1).expect("non-empty text")
    }

    #[test]
    fn embeds_document_verbatim() {
        let raw = "Revenue grew 12% {\"not\": \"json\"}\nPage two  \u{00e9}\t<<<END";
        let prompt = build_prompt(&text(raw));
        assert_eq!(prompt.document(), raw);

        let start = prompt.as_str().find(DOCUMENT_START).unwrap() + DOCUMENT_START.len() + 1;
        assert_eq!(&prompt.as_str()[start..start + raw.len()], raw);
        assert!(prompt.as_str()[start + raw.len()..].starts_with(&format!("\n{DOCUMENT_END}")));
    }

    #[test]
    fn is_deterministic() {
        let t = text("Q3 results were strong.");
        assert_eq!(build_prompt(&t), build_prompt(&t));
    }

    #[test]
    fn carries_rules_and_schema() {
        let p = build_prompt(&text("x"));
        let s = p.as_str();
        assert!(s.contains("explicitly present in the document"));
        assert!(s.contains("return null"));
        assert!(s.contains("emoji"));
        assert!(s.contains("bullet points"));
        assert!(s.contains("verbatim"));
        assert!(s.contains("no markdown code fences"));
        for key in [
            "companyName",
            "reportPeriod",
            "managementTone",
            "confidenceLevel",
            "keyPositives",
            "keyConcerns",
            "forwardGuidance",
            "otherGuidance",
            "capacityUtilization",
            "growthInitiatives",
            "notableQuotes",
        ] {
            assert!(s.contains(key), "schema missing {key}");
        }
    }

    #[test]
    fn schema_is_valid_json() {
        // Template prose aside, the schema block itself must parse so the
        // model sees a well-formed example.
        let v: serde_json::Value = serde_json::from_str(OUTPUT_SCHEMA).unwrap();
        assert!(v.get("managementTone").is_some());
    }

    #[test]
    fn document_sits_after_schema() {
        let p = build_prompt(&text("body"));
        let s = p.as_str();
        assert!(s.find(OUTPUT_SCHEMA).unwrap() < s.find(DOCUMENT_START).unwrap());
        assert!(s.ends_with(CLOSING_INSTRUCTION));
    }
}
