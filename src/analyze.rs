//! Request orchestration: upload in, structured analysis out.
//!
//! [`AnalysisPipeline::analyze`] runs one request through every stage in
//! order and stops at the first failure:
//!
//! ```text
//! Received ─▶ Extracting ─▶ Prompting ─▶ Invoking ─▶ Validating ─▶ Completed
//!     │            │            │            │             │
//!     └────────────┴────────────┴─────┬──────┴─────────────┘
//!                                     ▼
//!                              Failed(ErrorKind)
//! ```
//!
//! The pipeline holds only read-only configuration and the invoker behind an
//! `Arc`, so one instance serves any number of concurrent requests. Nothing
//! outlives a request; dropping the returned future abandons the remaining
//! stages.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ErrorKind};
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::input::{self, UploadedDocument};
use crate::pipeline::llm::{LlmInvoker, ModelInvoker};
use crate::pipeline::postprocess;
use crate::progress::ProgressCallback;
use crate::prompts;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracting,
    Prompting,
    Invoking,
    Validating,
    Completed,
    Failed(ErrorKind),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => f.write_str("received"),
            Stage::Extracting => f.write_str("extracting"),
            Stage::Prompting => f.write_str("prompting"),
            Stage::Invoking => f.write_str("invoking"),
            Stage::Validating => f.write_str("validating"),
            Stage::Completed => f.write_str("completed"),
            Stage::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// The analysis pipeline for one configured model.
#[derive(Clone)]
pub struct AnalysisPipeline {
    invoker: Arc<dyn ModelInvoker>,
    config: AnalysisConfig,
    progress: Option<ProgressCallback>,
}

impl AnalysisPipeline {
    /// Build a pipeline around an explicit invoker.
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: AnalysisConfig) -> Self {
        Self {
            invoker,
            config,
            progress: None,
        }
    }

    /// Build a pipeline whose invoker is created from `config`.
    ///
    /// Fails with `ProviderNotConfigured` when the named provider cannot be
    /// initialised (usually a missing API key).
    pub fn from_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let invoker = LlmInvoker::from_config(&config)?;
        info!(
            "Using provider={}, model={}",
            config.provider_name, config.model
        );
        Ok(Self::new(Arc::new(invoker), config))
    }

    /// Report stage transitions to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one uploaded document.
    ///
    /// Success is all-or-nothing: either a validated result or exactly one
    /// [`AnalysisError`] naming the stage that failed.
    pub async fn analyze(&self, document: UploadedDocument) -> Result<AnalysisOutput, AnalysisError> {
        let total_start = Instant::now();
        let mut stats = AnalysisStats::default();
        info!(
            "Analysis request: {} ({} bytes)",
            document.filename.as_deref().unwrap_or("<unnamed>"),
            document.size()
        );
        self.enter(Stage::Received);

        match self.run(document, &mut stats).await {
            Ok(result) => {
                stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
                self.enter(Stage::Completed);
                info!(
                    "Analysis complete: {} pages, {} chars, {}ms",
                    stats.page_count, stats.extracted_chars, stats.total_duration_ms
                );
                Ok(AnalysisOutput { result, stats })
            }
            Err(e) => {
                self.enter(Stage::Failed(e.kind()));
                if e.is_client_fault() {
                    warn!("Analysis rejected: {}", e);
                } else {
                    error!("Analysis failed: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        document: UploadedDocument,
        stats: &mut AnalysisStats,
    ) -> Result<crate::output::StructuredAnalysisResult, AnalysisError> {
        document.validate(self.config.max_upload_bytes)?;

        // ── Extraction ───────────────────────────────────────────────────
        self.enter(Stage::Extracting);
        let extract_start = Instant::now();
        let data = document.data;
        let pdf_text = tokio::task::spawn_blocking(move || extract::extract_text(&data))
            .await
            .map_err(|e| AnalysisError::Internal(format!("extraction task failed: {e}")))??;
        stats.extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        stats.page_count = pdf_text.page_count;
        stats.fallback_runs = pdf_text.fallback_runs;

        if pdf_text.fallback_runs > 0 {
            warn!(
                "{} of {} text runs could not be decoded and were passed through raw",
                pdf_text.fallback_runs, pdf_text.run_count
            );
        }

        let (pages, method) = (pdf_text.page_count, pdf_text.method);
        let text = ExtractedText::from_pdf_text(pdf_text).ok_or(AnalysisError::NoText { pages })?;
        stats.extracted_chars = text.char_count();
        debug!(
            "Extracted {} chars from {} pages ({:?})",
            stats.extracted_chars, pages, method
        );

        // ── Prompt ───────────────────────────────────────────────────────
        self.enter(Stage::Prompting);
        let prompt = prompts::build_prompt(&text);
        debug!("Prompt is {} bytes", prompt.len());

        // ── Model call ───────────────────────────────────────────────────
        self.enter(Stage::Invoking);
        let model_start = Instant::now();
        let response = self.invoker.invoke(&prompt).await?;
        stats.model_duration_ms = model_start.elapsed().as_millis() as u64;
        stats.prompt_tokens = response.prompt_tokens;
        stats.completion_tokens = response.completion_tokens;

        // ── Validation ───────────────────────────────────────────────────
        self.enter(Stage::Validating);
        postprocess::parse_analysis(response.as_str())
    }

    fn enter(&self, stage: Stage) {
        debug!("stage: {}", stage);
        if let Some(ref cb) = self.progress {
            cb.on_stage(stage);
        }
    }
}

impl fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("model", &self.invoker.model())
            .field("config", &self.config)
            .finish()
    }
}

/// Analyse an uploaded document with a pipeline built from `config`.
pub async fn analyze_document(
    document: UploadedDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    AnalysisPipeline::from_config(config.clone())?
        .analyze(document)
        .await
}

/// Analyse a local PDF or a PDF URL.
pub async fn analyze_file(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let document = input::resolve_input(input_str.as_ref(), config).await?;
    analyze_document(document, config).await
}

/// Synchronous wrapper around [`analyze_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_file(input_str, config))
}
