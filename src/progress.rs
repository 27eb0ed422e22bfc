//! Progress-callback trait for per-page analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events while the orchestrator walks the document. Pages are processed
//! strictly in order, so events for page `n` always precede those for
//! page `n + 1`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc_analyzer::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_progress(&self, fraction: f32) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{:.0}%", fraction * 100.0);
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` lets the callback travel into a
/// background task (see [`crate::stream::spawn_analysis`]).
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the page count is known, before the first page.
    ///
    /// `total_pages` is the number of pages this run will process, not the
    /// document's page count.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before page `page_num` (1-indexed) is rendered.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when the model returned an analysis for a page.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when the inference call for a page failed. The run continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Fraction of pages done, `(i + 1) / total`, reported after every page.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called before the summary call is made.
    fn on_summary_start(&self) {}

    /// Called once after every page has been attempted.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
