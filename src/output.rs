//! Data model produced by an analysis run.
//!
//! ```text
//! Document ──render──▶ RenderedImage ──analyze──▶ AnalysisResult
//!                                                   │ (page order)
//!                                                   ▼
//!                                   AnalysisSet ──▶ summary ──▶ Report
//! ```

use crate::error::{AnalyzerError, PageError};
use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Container format of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Paginated PDF, rendered page by page.
    Pdf,
    /// A single standalone PNG or JPEG image: a one-page document.
    Image,
}

/// Identity of the analysed document, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub kind: DocumentKind,
    pub page_count: usize,
}

impl DocumentInfo {
    /// Size formatted as kilobytes with two decimals, e.g. `"12.50 KB"`.
    pub fn size_display(&self) -> String {
        format!("{:.2} KB", self.size_bytes as f64 / 1024.0)
    }
}

/// A page rasterised and PNG-encoded, ready to send to the model.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// 1-indexed page this image was rendered from.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("page_num", &self.page_num)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// Outcome of analysing one page.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// 1-indexed page number.
    pub page_num: usize,

    /// Model text on success; the captured inference failure otherwise.
    pub outcome: Result<String, PageError>,

    /// The image that was sent, retained for display alongside the text.
    #[serde(skip)]
    pub image: Arc<RenderedImage>,

    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl AnalysisResult {
    /// Text shown for this page: the model output, or
    /// `"Error analyzing this page: <cause>"` when the call failed.
    pub fn display_text(&self) -> Cow<'_, str> {
        match &self.outcome {
            Ok(text) => Cow::Borrowed(text),
            Err(e) => Cow::Owned(e.placeholder()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&PageError> {
        self.outcome.as_ref().err()
    }
}

/// Ordered per-page results of one run.
///
/// Page numbers are strictly ascending with no duplicates; the set only
/// grows through [`AnalysisSet::from_results`] or the orchestrator, both of
/// which enforce that.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AnalysisSet {
    results: Vec<AnalysisResult>,
}

impl AnalysisSet {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            results: Vec::with_capacity(n),
        }
    }

    /// Build a set from results that are already in page order.
    pub fn from_results(results: Vec<AnalysisResult>) -> Result<Self, AnalyzerError> {
        let mut set = Self::with_capacity(results.len());
        for r in results {
            set.push(r)?;
        }
        Ok(set)
    }

    pub(crate) fn push(&mut self, result: AnalysisResult) -> Result<(), AnalyzerError> {
        if result.page_num == 0 {
            return Err(AnalyzerError::Internal("page numbers are 1-indexed".into()));
        }
        if let Some(last) = self.results.last() {
            if result.page_num <= last.page_num {
                return Err(AnalyzerError::Internal(format!(
                    "page {} recorded after page {}",
                    result.page_num, last.page_num
                )));
            }
        }
        self.results.push(result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnalysisResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[AnalysisResult] {
        &self.results
    }

    /// Result for a 1-indexed page, if it was processed.
    pub fn get(&self, page_num: usize) -> Option<&AnalysisResult> {
        self.results
            .binary_search_by_key(&page_num, |r| r.page_num)
            .ok()
            .map(|i| &self.results[i])
    }

    /// Pages whose inference call failed.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.results
            .iter()
            .filter(|r| r.is_error())
            .map(|r| r.page_num)
            .collect()
    }

    /// Number of pages the model answered.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| !r.is_error()).count()
    }

    pub fn into_vec(self) -> Vec<AnalysisResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a AnalysisSet {
    type Item = &'a AnalysisResult;
    type IntoIter = std::slice::Iter<'a, AnalysisResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every target page was processed.
    Completed,
    /// An unrecoverable error stopped the run; no results were kept.
    Failed,
    /// The run was abandoned before it finished.
    Cancelled,
}

impl RunStatus {
    /// Status a run ends in when it fails with `err`.
    pub fn from_error(err: &AnalyzerError) -> Self {
        match err {
            AnalyzerError::Cancelled => RunStatus::Cancelled,
            _ => RunStatus::Failed,
        }
    }
}

/// Timing and token counters for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages the run processed (`min(limit, total)`, or all when unlimited).
    pub processed_pages: usize,
    /// Processed pages whose inference call failed.
    pub failed_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub inference_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub document: DocumentInfo,
    pub status: RunStatus,
    pub pages: AnalysisSet,
    /// Cross-page synthesis; `None` when skipped or when the call failed
    /// under [`crate::config::SummaryPolicy::Surface`].
    pub summary: Option<String>,
    /// Cause of a failed summary call, if any.
    pub summary_error: Option<String>,
    /// The combined downloadable report, when one could be built.
    pub report: Option<Report>,
    pub stats: AnalysisStats,
}

impl AnalysisOutput {
    /// Treat a failed summary as an error.
    ///
    /// Per-page results are dropped with the output; callers that still want
    /// them should inspect [`AnalysisOutput::summary_error`] instead.
    pub fn into_result(self) -> Result<Self, AnalyzerError> {
        match self.summary_error {
            Some(detail) if self.report.is_none() => Err(AnalyzerError::SummaryFailed { detail }),
            _ => Ok(self),
        }
    }
}
