//! Pipeline stages for earnings-call analysis.
//!
//! Each submodule implements one transformation step; the orchestrator in
//! [`crate::analyze`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (prompts) ──▶ llm ──▶ postprocess
//! (upload) (pdf-extract)              (model)   (fences + schema)
//! ```
//!
//! 1. [`input`]   validate the upload, or resolve a CLI path/URL into one
//! 2. [`extract`] decode every page's text through its fonts; CPU-bound, so the
//!    orchestrator runs it in `spawn_blocking`
//! 3. [`llm`]     the single model call behind the [`llm::ModelInvoker`]
//!    seam; the only stage with network I/O
//! 4. [`postprocess`] strip code fences, parse and validate the JSON

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
