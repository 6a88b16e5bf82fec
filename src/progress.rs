//! Progress-callback trait for pipeline stage events.
//!
//! Attach an [`Arc<dyn AnalysisProgressCallback>`] with
//! [`crate::analyze::AnalysisPipeline::with_progress`] to hear about each
//! stage as a request moves through the pipeline. The CLI uses it to drive
//! its spinner; a host application can forward the events wherever it likes.
//!
//! # Example
//!
//! ```rust
//! use edgequake_earnings::{AnalysisProgressCallback, Stage};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<Stage>>);
//!
//! impl AnalysisProgressCallback for Recorder {
//!     fn on_stage(&self, stage: Stage) {
//!         if let Ok(mut seen) = self.0.lock() {
//!             seen.push(stage);
//!         }
//!     }
//! }
//! ```

use crate::analyze::Stage;
use std::sync::Arc;

/// Called by the pipeline on every stage transition.
///
/// Requests may run concurrently, so implementations must be `Send + Sync`
/// and synchronise any shared state themselves.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called when a request enters `stage`. Terminal stages are
    /// [`Stage::Completed`] and [`Stage::Failed`].
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Shared callback handle as stored by the pipeline.
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
