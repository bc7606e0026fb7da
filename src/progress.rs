//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as pages are read, models fall back, and questions are formatted.
//!
//! # Example
//!
//! ```rust
//! use examquiz::{ModelRole, PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for FallbackCounter {
//!     fn on_model_failed(&self, role: ModelRole, model: &str, error: &str) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{role} model {model} failed: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FallbackCounter { failures: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ModelRole;
use std::sync::Arc;

/// Called by the pipeline as it works through a run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is sequential, but the trait is
/// `Send + Sync` so an implementation can be shared with other tasks.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once after the upload is rasterised.
    ///
    /// # Arguments
    /// * `total_pages` — number of page images that will be read
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the OCR chain starts on a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total page images
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's text has been extracted.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total page images
    /// * `text_len`    — byte length of the extracted text
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called each time a model fails and the chain moves on.
    ///
    /// # Arguments
    /// * `role`  — which chain the model belongs to
    /// * `model` — identifier of the failed model
    /// * `error` — human-readable error description
    fn on_model_failed(&self, role: ModelRole, model: &str, error: &str) {
        let _ = (role, model, error);
    }

    /// Called just before the formatting chain starts.
    fn on_formatting_start(&self, raw_text_len: usize) {
        let _ = raw_text_len;
    }

    /// Called once the formatted text has been parsed.
    ///
    /// # Arguments
    /// * `question_count` — number of questions recovered
    fn on_run_complete(&self, question_count: usize) {
        let _ = question_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
