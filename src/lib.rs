//! # edgequake-earnings
//!
//! Turn an earnings-call transcript PDF into a structured analyst report
//! using a generative-text model.
//!
//! The PDF's text layer is extracted, embedded verbatim in a fixed analyst
//! prompt, and sent to the model in a single call. The model's answer is
//! stripped of code fences, parsed as JSON and checked against the expected
//! shape before it is returned as a [`StructuredAnalysisResult`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Input      media type + size checks, no parsing yet
//!  ├─ 2. Extract    font-aware page text via pdf-extract, lopdf run walk as fallback
//!  ├─ 3. Prompt     analyst rules + JSON schema + document
//!  ├─ 4. Model      one call through edgequake-llm (gemini by default)
//!  ├─ 5. Validate   fence stripping, JSON parse, required keys
//!  └─ 6. Output     StructuredAnalysisResult + timing/token stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_earnings::{analyze_file, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY from the environment
//!     let config = AnalysisConfig::default();
//!     let output = analyze_file("q3-call.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `earnings` binary (clap + anyhow + indicatif) |
//! | `server` | on      | The [`server`] module and `earnings-server` binary (axum + tower-http) |
//!
//! Library-only use:
//! ```toml
//! edgequake-earnings = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_document, analyze_file, analyze_sync, AnalysisPipeline, Stage};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, ErrorKind};
pub use output::{
    AnalysisOutput, AnalysisStats, ConfidenceLevel, ForwardGuidance, GrowthInitiative, KeyPoint,
    ManagementTone, StructuredAnalysisResult, Tone,
};
pub use pipeline::input::UploadedDocument;
pub use pipeline::llm::{LlmInvoker, ModelInvoker, RawModelResponse};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::AnalysisPrompt;
