//! HTTP surface: `POST /api/analyze`.
//!
//! The request is a multipart form whose file field is named `pdf`. Unknown
//! fields are drained and ignored. Responses are JSON:
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | success | 200 | `{"success": true, "data": <analysis>}` |
//! | missing / non-PDF upload, unreadable PDF, no text | 400 | `{"error": "..."}` |
//! | upload above the limit | 413 | `{"error": "..."}` |
//! | model unavailable, bad model output, internal fault | 500 | `{"error": "..."}` |
//!
//! Error bodies carry [`AnalysisError::user_message`]; the full cause is
//! logged only.

use crate::analyze::AnalysisPipeline;
use crate::error::AnalysisError;
use crate::pipeline::input::UploadedDocument;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, warn};

/// Name of the multipart file field.
pub const FILE_FIELD: &str = "pdf";

/// Allowance for multipart boundaries and part headers on top of the
/// upload limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
}

/// Build the application router.
///
/// `allowed_origin` is the single origin allowed by CORS, e.g.
/// `http://localhost:5173`.
pub fn router(pipeline: AnalysisPipeline, allowed_origin: &str) -> Result<Router, AnalysisError> {
    let origin = HeaderValue::from_str(allowed_origin).map_err(|e| {
        AnalysisError::InvalidConfig(format!("Invalid allowed origin '{allowed_origin}': {e}"))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let body_limit = usize::try_from(pipeline.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    Ok(Router::new()
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state))
}

/// `POST /api/analyze`
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let limit = state.pipeline.config().max_upload_bytes;

    let result = match multipart {
        Ok(multipart) => match parse_multipart(multipart, limit).await {
            Ok(document) => state.pipeline.analyze(document).await,
            Err(e) => Err(e),
        },
        Err(rejection) => {
            debug!("Request is not multipart: {}", rejection);
            Err(AnalysisError::MissingFile)
        }
    };

    match result {
        Ok(output) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": output.result })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Read the `pdf` field out of a multipart form.
pub async fn parse_multipart(
    mut multipart: Multipart,
    limit: u64,
) -> Result<UploadedDocument, AnalysisError> {
    let mut document: Option<UploadedDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            // Drain unknown fields; the body limit still applies to them.
            field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            continue;
        }

        let media_type = field.content_type().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?
            .to_vec();

        let mut doc = UploadedDocument::new(data, media_type);
        doc.filename = filename;
        document = Some(doc);
    }

    document.ok_or(AnalysisError::MissingFile)
}

fn multipart_error(e: MultipartError, limit: u64) -> AnalysisError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // The body limit tripped mid-stream; the exact size is unknown.
        AnalysisError::PayloadTooLarge {
            size: limit.saturating_add(1),
            limit,
        }
    } else {
        AnalysisError::InvalidInput {
            input: "multipart body".into(),
            reason: e.body_text(),
        }
    }
}

/// HTTP status for an analysis failure.
pub fn status_for(e: &AnalysisError) -> StatusCode {
    match e {
        AnalysisError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        e if e.is_client_fault() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &AnalysisError) -> Response {
    let status = status_for(e);
    if status.is_server_error() {
        error!("{} {}: {}", status.as_u16(), e.kind(), e);
    } else {
        warn!("{} {}: {}", status.as_u16(), e.kind(), e);
    }
    (status, Json(json!({ "error": e.user_message() }))).into_response()
}
