//! Background analysis: run the orchestrator on a Tokio task and observe it
//! through an ordered event channel.
//!
//! ## Why a task?
//!
//! A document of a few dozen pages takes minutes of model round-trips. A
//! presentation layer (progress bar, web handler, TUI) wants to keep
//! responding while that happens, and wants a way to give up. The run
//! happens on its own task; progress arrives as [`AnalysisEvent`]s; dropping
//! the [`AnalysisTask`] or calling [`AnalysisTask::cancel`] abandons it.
//!
//! Page results are only delivered through the final [`AnalysisOutput`]:
//! a cancelled or failed run never hands out a partial result set.

use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::inference::InferenceClient;
use crate::output::{AnalysisOutput, RunStatus};
use crate::pipeline::input::Document;
use crate::progress::{AnalysisProgressCallback, ProgressCallback};
use crate::run::execute;
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Progress of a background run, emitted in strict page order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// The document was opened; `total` pages will be processed.
    RunStarted { total: usize },
    /// Page `page_num` (1-indexed) is being rendered and analysed.
    PageStarted { page_num: usize, total: usize },
    /// Page `page_num` is done. `failed` is set when its inference call failed.
    PageFinished {
        page_num: usize,
        total: usize,
        fraction: f32,
        failed: bool,
    },
    /// Every page is done and the summary call is being made.
    SummaryStarted,
    /// The run reached a terminal state. Always the last event.
    Finished { status: RunStatus },
}

/// Forwards orchestrator callbacks onto the event channel, then to the
/// caller's own callback, if any.
struct ChannelProgress {
    tx: mpsc::UnboundedSender<AnalysisEvent>,
    inner: Option<ProgressCallback>,
}

impl ChannelProgress {
    fn emit(&self, event: AnalysisEvent) {
        // The receiver may already be gone; the run carries on regardless.
        let _ = self.tx.send(event);
    }
}

impl AnalysisProgressCallback for ChannelProgress {
    fn on_run_start(&self, total_pages: usize) {
        self.emit(AnalysisEvent::RunStarted { total: total_pages });
        if let Some(ref cb) = self.inner {
            cb.on_run_start(total_pages);
        }
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.emit(AnalysisEvent::PageStarted {
            page_num,
            total: total_pages,
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_start(page_num, total_pages);
        }
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        self.emit(AnalysisEvent::PageFinished {
            page_num,
            total: total_pages,
            fraction: page_num as f32 / total_pages as f32,
            failed: false,
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_complete(page_num, total_pages, text_len);
        }
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        self.emit(AnalysisEvent::PageFinished {
            page_num,
            total: total_pages,
            fraction: page_num as f32 / total_pages as f32,
            failed: true,
        });
        if let Some(ref cb) = self.inner {
            cb.on_page_error(page_num, total_pages, error);
        }
    }

    fn on_progress(&self, fraction: f32) {
        if let Some(ref cb) = self.inner {
            cb.on_progress(fraction);
        }
    }

    fn on_summary_start(&self) {
        self.emit(AnalysisEvent::SummaryStarted);
        if let Some(ref cb) = self.inner {
            cb.on_summary_start();
        }
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_run_complete(total_pages, success_count);
        }
    }
}

/// Handle to a run executing on a background task.
///
/// Dropping the handle cancels the run.
pub struct AnalysisTask {
    events: Option<mpsc::UnboundedReceiver<AnalysisEvent>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<AnalysisOutput, AnalyzerError>>>,
}

impl AnalysisTask {
    /// Next progress event, or `None` once the run has ended and every event
    /// was consumed (or after [`AnalysisTask::events`] took the receiver).
    pub async fn next_event(&mut self) -> Option<AnalysisEvent> {
        match self.events {
            Some(ref mut rx) => rx.recv().await,
            None => None,
        }
    }

    /// Take the event receiver as a `Stream`. Returns `None` if already taken.
    pub fn events(&mut self) -> Option<impl Stream<Item = AnalysisEvent> + Send + Unpin + 'static> {
        self.events.take().map(UnboundedReceiverStream::new)
    }

    /// Request cancellation. The run stops at its next page boundary or
    /// in-flight call and resolves to [`AnalyzerError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run; clone it to cancel from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish and take its output.
    pub async fn join(mut self) -> Result<AnalysisOutput, AnalyzerError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| AnalyzerError::Internal("analysis task already joined".into()))?;
        handle
            .await
            .map_err(|e| AnalyzerError::Internal(format!("Analysis task panicked: {}", e)))?
    }
}

impl Drop for AnalysisTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Start analysing `document` on a background task.
///
/// Must be called from within a Tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc_analyzer::{
///     spawn_analysis, AnalysisConfig, AnalysisEvent, Document, LlmInferenceClient,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let document = Document::from_bytes("memo.pdf", std::fs::read("memo.pdf")?)?;
/// let config = AnalysisConfig::default();
/// let client = Arc::new(LlmInferenceClient::from_config(&config));
///
/// let mut task = spawn_analysis(document, client, config);
/// while let Some(event) = task.next_event().await {
///     if let AnalysisEvent::PageFinished { page_num, fraction, .. } = event {
///         eprintln!("page {page_num} done ({:.0}%)", fraction * 100.0);
///     }
/// }
/// let output = task.join().await?;
/// # Ok(())
/// # }
/// ```
pub fn spawn_analysis(
    document: Document,
    client: Arc<dyn InferenceClient>,
    config: AnalysisConfig,
) -> AnalysisTask {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let forwarder = ChannelProgress {
        tx: tx.clone(),
        inner: config.progress_callback.clone(),
    };
    let mut config = config;
    config.progress_callback = Some(Arc::new(forwarder));

    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = execute(&document, client.as_ref(), &config, &token).await;
        let status = match result {
            Ok(ref output) => output.status,
            Err(ref e) => RunStatus::from_error(e),
        };
        debug!("Background analysis of {} ended: {:?}", document.filename(), status);
        let _ = tx.send(AnalysisEvent::Finished { status });
        result
    });

    AnalysisTask {
        events: Some(rx),
        cancel,
        handle: Some(handle),
    }
}
