//! Error types for the edgequake-earnings library.
//!
//! Every failure in the analysis pipeline surfaces as one [`AnalysisError`]
//! variant, and every variant belongs to exactly one [`ErrorKind`]:
//!
//! * [`ErrorKind::Input`]: the upload itself is unusable (missing, wrong
//!   media type, too large). The pipeline never starts.
//! * [`ErrorKind::Extraction`]: the PDF was accepted but produced no usable
//!   text (typically a scanned, image-only document).
//! * [`ErrorKind::Invocation`]: the model service could not be reached,
//!   refused the call or returned nothing.
//! * [`ErrorKind::Format`]: the model answered, but not with the JSON object
//!   the prompt asked for.
//! * [`ErrorKind::Internal`]: configuration mistakes and runtime faults that
//!   sit outside the four pipeline stages.
//!
//! Input and extraction failures are the caller's fault; everything else is
//! ours. [`AnalysisError::user_message`] gives the text that may be shown to
//! an end user; the `Display` impl carries the diagnostic detail for logs.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-earnings library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no PDF payload.
    #[error("No PDF file uploaded")]
    MissingFile,

    /// The declared media type is not `application/pdf`.
    #[error("Unsupported media type '{media_type}': only application/pdf is accepted")]
    UnsupportedMediaType { media_type: String },

    /// The payload exceeds the configured upload limit.
    #[error("Payload of {size} bytes exceeds the {limit}-byte upload limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input could not be read or is not a path/URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The payload could not be parsed as a PDF document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// The PDF parsed but contains no extractable text.
    #[error("No text found in {pages}-page PDF; the file may be scanned or image-based")]
    NoText { pages: usize },

    // ── Invocation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM API rejected the call with a rate limit.
    #[error("Rate limit exceeded for model '{model}': {message}")]
    RateLimitExceeded { model: String, message: String },

    /// The LLM call did not finish within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The LLM answered with blank text.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    // ── Format errors ─────────────────────────────────────────────────────
    /// The sanitised response is not parseable JSON.
    #[error("Model output is not valid JSON: {detail}")]
    InvalidJson { detail: String },

    /// A required top-level key is absent from the model output.
    #[error("Model output is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The JSON parsed but does not have the expected shape.
    #[error("Model output does not match the analysis schema: {detail}")]
    SchemaMismatch { detail: String },

    // ── Internal errors ───────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    Extraction,
    Invocation,
    Format,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Input => "input",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Invocation => "invocation",
            ErrorKind::Format => "format",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl ErrorKind {
    /// `true` when the failure was caused by what the caller sent.
    pub fn is_client_fault(self) -> bool {
        matches!(self, ErrorKind::Input | ErrorKind::Extraction)
    }
}

impl AnalysisError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        use AnalysisError::*;
        match self {
            MissingFile
            | UnsupportedMediaType { .. }
            | PayloadTooLarge { .. }
            | FileNotFound { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. } => ErrorKind::Input,
            CorruptPdf { .. } | NoText { .. } => ErrorKind::Extraction,
            ProviderNotConfigured { .. }
            | LlmApiError { .. }
            | RateLimitExceeded { .. }
            | ApiTimeout { .. }
            | EmptyResponse => ErrorKind::Invocation,
            InvalidJson { .. } | MissingField { .. } | SchemaMismatch { .. } => ErrorKind::Format,
            InvalidConfig(_) | Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` for input and extraction failures.
    pub fn is_client_fault(&self) -> bool {
        self.kind().is_client_fault()
    }

    /// `true` for failures worth another attempt at the model call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalysisError::LlmApiError { .. }
                | AnalysisError::RateLimitExceeded { .. }
                | AnalysisError::ApiTimeout { .. }
        )
    }

    /// Message safe to return to an end user.
    ///
    /// Client faults repeat the diagnostic text; internal faults get a fixed
    /// message because their detail may contain provider responses or raw
    /// model output.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::MissingFile => "No PDF file uploaded".to_string(),
            AnalysisError::UnsupportedMediaType { .. } => {
                "Only PDF files are allowed".to_string()
            }
            AnalysisError::PayloadTooLarge { limit, .. } => format!(
                "PDF exceeds the maximum upload size of {} MB",
                limit / (1024 * 1024)
            ),
            AnalysisError::CorruptPdf { .. } => {
                "Could not read the PDF. The file may be corrupt.".to_string()
            }
            AnalysisError::NoText { .. } => {
                "Could not extract text from PDF. File may be scanned or image-based.".to_string()
            }
            e if e.kind() == ErrorKind::Input => e.to_string(),
            e if e.kind() == ErrorKind::Format => {
                "AI returned invalid format. Please try again.".to_string()
            }
            e if e.kind() == ErrorKind::Invocation => {
                "The analysis service is unavailable. Please try again.".to_string()
            }
            _ => "Something went wrong".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(AnalysisError::MissingFile.kind(), ErrorKind::Input);
        assert_eq!(
            AnalysisError::PayloadTooLarge { size: 11, limit: 10 }.kind(),
            ErrorKind::Input
        );
        assert_eq!(AnalysisError::NoText { pages: 1 }.kind(), ErrorKind::Extraction);
        assert_eq!(AnalysisError::EmptyResponse.kind(), ErrorKind::Invocation);
        assert_eq!(
            AnalysisError::MissingField { field: "managementTone" }.kind(),
            ErrorKind::Format
        );
        assert_eq!(AnalysisError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn client_fault_split() {
        assert!(AnalysisError::MissingFile.is_client_fault());
        assert!(AnalysisError::CorruptPdf { detail: "x".into() }.is_client_fault());
        assert!(!AnalysisError::ApiTimeout { secs: 5 }.is_client_fault());
        assert!(!AnalysisError::InvalidJson { detail: "x".into() }.is_client_fault());
    }

    #[test]
    fn only_service_failures_are_transient() {
        assert!(AnalysisError::ApiTimeout { secs: 1 }.is_transient());
        assert!(AnalysisError::RateLimitExceeded {
            model: "m".into(),
            message: "429".into()
        }
        .is_transient());
        assert!(!AnalysisError::EmptyResponse.is_transient());
        assert!(!AnalysisError::MissingFile.is_transient());
    }

    #[test]
    fn format_errors_hide_raw_output() {
        let e = AnalysisError::InvalidJson {
            detail: "expected value at line 1 column 1: Sorry, I cannot comply.".into(),
        };
        let msg = e.user_message();
        assert!(!msg.contains("Sorry"), "got: {msg}");
        assert!(msg.contains("invalid format"));
    }

    #[test]
    fn payload_too_large_message_in_megabytes() {
        let e = AnalysisError::PayloadTooLarge {
            size: 10 * 1024 * 1024 + 1,
            limit: 10 * 1024 * 1024,
        };
        assert!(e.user_message().contains("10 MB"));
        assert!(e.to_string().contains("10485761"));
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Invocation.to_string(), "invocation");
    }
}
