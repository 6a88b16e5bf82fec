//! Input resolution: turn an upload, a path or a URL into a validated
//! [`UploadedDocument`].
//!
//! The HTTP handler builds an `UploadedDocument` straight from the multipart
//! field; the CLI goes through [`resolve_input`]. Either way the document is
//! checked with [`UploadedDocument::validate`] before any extraction work
//! starts, so an oversized or non-PDF payload never reaches the parser.
//!
//! Size is checked as early as the source allows: local files by their
//! metadata before reading, downloads by `Content-Length` before the body is
//! fetched and again once it has arrived.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use std::path::PathBuf;
use tracing::{debug, info};

/// The only media type the pipeline accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

/// A document as received, before any validation.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub data: Vec<u8>,
    /// Declared media type, as sent by the client.
    pub media_type: String,
    pub filename: Option<String>,
}

impl UploadedDocument {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Reject empty payloads, non-PDF media types and oversize payloads.
    ///
    /// The media type comparison ignores case and parameters, so
    /// `Application/PDF; name=x.pdf` is accepted.
    pub fn validate(&self, max_bytes: u64) -> Result<(), AnalysisError> {
        if self.data.is_empty() {
            return Err(AnalysisError::MissingFile);
        }
        if !is_pdf_media_type(&self.media_type) {
            return Err(AnalysisError::UnsupportedMediaType {
                media_type: self.media_type.clone(),
            });
        }
        check_size(self.size(), max_bytes)
    }
}

/// `true` when the essence of `media_type` is `application/pdf`.
pub fn is_pdf_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Fail with `PayloadTooLarge` when `size` exceeds `limit`.
pub fn check_size(size: u64, limit: u64) -> Result<(), AnalysisError> {
    if size > limit {
        return Err(AnalysisError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or an HTTP(S) URL to an [`UploadedDocument`].
///
/// The media type is sniffed from the `%PDF` magic bytes; anything else is
/// reported as `application/octet-stream` and rejected by `validate`.
pub async fn resolve_input(
    input: &str,
    config: &AnalysisConfig,
) -> Result<UploadedDocument, AnalysisError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: String::new(),
            reason: "expected a file path or an http(s) URL".into(),
        });
    }

    if is_url(input) {
        download_url(input, config).await
    } else {
        read_local(input, config.max_upload_bytes).await
    }
}

async fn read_local(path_str: &str, max_bytes: u64) -> Result<UploadedDocument, AnalysisError> {
    let path = PathBuf::from(path_str);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AnalysisError::FileNotFound { path: path.clone() })?;
    if !metadata.is_file() {
        return Err(AnalysisError::InvalidInput {
            input: path_str.to_string(),
            reason: "not a regular file".into(),
        });
    }
    check_size(metadata.len(), max_bytes)?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| AnalysisError::InvalidInput {
            input: path_str.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), data.len());

    let media_type = sniff_media_type(&data);
    let mut doc = UploadedDocument::new(data, media_type);
    doc.filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(doc)
}

async fn download_url(url: &str, config: &AnalysisConfig) -> Result<UploadedDocument, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let secs = config.download_timeout_secs;
    let failed = |reason: String| AnalysisError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(&classify)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if let Some(len) = response.content_length() {
        check_size(len, config.max_upload_bytes)?;
    }

    let filename = filename_from_url(url);
    let bytes = response.bytes().await.map_err(&classify)?;
    check_size(bytes.len() as u64, config.max_upload_bytes)?;

    info!("Downloaded {} bytes", bytes.len());

    let data = bytes.to_vec();
    let media_type = sniff_media_type(&data);
    let doc = UploadedDocument::new(data, media_type);
    Ok(match filename {
        Some(name) => doc.with_filename(name),
        None => doc,
    })
}

fn sniff_media_type(data: &[u8]) -> &'static str {
    if data.starts_with(PDF_MAGIC) {
        PDF_MEDIA_TYPE
    } else {
        "application/octet-stream"
    }
}

/// Last path segment of the URL, when it looks like a file name.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
