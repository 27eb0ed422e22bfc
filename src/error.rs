//! Error types for the edgequake-doc-analyzer library.
//!
//! Three error types map onto the three places a run can go wrong:
//!
//! * [`AnalyzerError`] is **fatal**: the run cannot proceed or its result
//!   cannot be delivered (document cannot be read or rendered, provider not
//!   configured, summary call failed under the `Surface` policy). Returned as
//!   `Err(AnalyzerError)` from the top-level `analyze*` functions.
//!
//! * [`PageError`] is **non-fatal**: the inference call for one page failed.
//!   Stored inside [`crate::output::AnalysisResult`] so the run continues and
//!   the failure stays queryable instead of being folded into the page text.
//!
//! * [`InferenceError`] is what an [`crate::inference::InferenceClient`]
//!   returns. The page analyzer turns it into a [`PageError`]; the summarizer
//!   turns it into [`AnalyzerError::SummaryFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Prefix of the text shown in place of a page analysis that failed.
pub const PAGE_ERROR_PREFIX: &str = "Error analyzing this page: ";

/// Prefix of the text shown in place of a summary that failed under
/// [`crate::config::SummaryPolicy::Tolerate`].
pub const SUMMARY_ERROR_PREFIX: &str = "Error generating summary: ";

/// All fatal errors returned by the edgequake-doc-analyzer library.
///
/// Page-level inference failures use [`PageError`] and are stored in
/// [`crate::output::AnalysisResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a supported image (PNG, JPEG).
    #[error(
        "Unsupported document format for '{filename}'\nFirst bytes: {magic:?}\nSupported: PDF, PNG, JPEG."
    )]
    UnsupportedFormat { filename: String, magic: Vec<u8> },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The document container is corrupt and cannot be opened.
    #[error("Document '{filename}' is corrupt: {detail}")]
    CorruptDocument { filename: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error(
        "PDF '{filename}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>."
    )]
    PasswordRequired { filename: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{filename}'")]
    WrongPassword { filename: String },

    /// A single page could not be decoded or rasterised.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory), place the library\n\
next to the binary, or install it in a system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Inference errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The cross-page summary call failed.
    #[error("Error generating summary: {detail}")]
    SummaryFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Run control ───────────────────────────────────────────────────────
    /// The run was cancelled before it completed.
    #[error("Analysis cancelled")]
    Cancelled,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// `true` for failures to open or rasterise the document.
    ///
    /// These are fatal for the whole run: no partial result set is returned.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::CorruptDocument { .. }
                | AnalyzerError::PasswordRequired { .. }
                | AnalyzerError::WrongPassword { .. }
                | AnalyzerError::RenderFailed { .. }
                | AnalyzerError::PdfiumBindingFailed(_)
        )
    }
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::AnalysisResult::outcome`]. The run continues
/// with the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The single inference attempt for this page failed.
    #[error("{detail}")]
    InferenceFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::InferenceFailed { page, .. } => *page,
        }
    }

    /// Text shown in place of the analysis: `"Error analyzing this page: <cause>"`.
    pub fn placeholder(&self) -> String {
        format!("{PAGE_ERROR_PREFIX}{self}")
    }
}

/// Errors produced by an inference capability.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// The provider rejected or failed the request (timeout, quota, HTTP error).
    #[error("{message}")]
    Provider { message: String },

    /// No provider could be built for the requested model.
    #[error("provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// The provider answered without any text.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<InferenceError> for AnalyzerError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::NotConfigured { provider, hint } => {
                AnalyzerError::ProviderNotConfigured { provider, hint }
            }
            other => AnalyzerError::SummaryFailed {
                detail: other.to_string(),
            },
        }
    }
}
