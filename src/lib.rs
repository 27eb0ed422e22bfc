//! # edgequake-doc-analyzer
//!
//! Page-by-page analysis of scanned documents with Vision Language Models.
//!
//! ## Why this crate?
//!
//! Declassified memos, cables and reports are mostly scans: there is no text
//! layer to extract, and what OCR recovers loses the stamps, redactions and
//! handwritten notes that matter. This crate renders every page to an image,
//! asks a multimodal model to analyse it against a fixed checklist (document
//! type, people, places, subject, intelligence value), then asks for one
//! cross-page summary and assembles a downloadable report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PNG / JPEG
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise each page at 2× via pdfium (spawn_blocking)
//!  ├─ 3. Analyse    one vision call per page, strictly in page order
//!  ├─ 4. Summarise  one text-only call over every page analysis
//!  └─ 5. Report     summary + page-by-page text, written atomically
//! ```
//!
//! A failed page call becomes `"Error analyzing this page: <cause>"` and
//! the run continues; a page that cannot be rendered fails the whole run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc_analyzer::{analyze, AnalysisConfig, LlmInferenceClient, ModelChoice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = AnalysisConfig::builder()
//!         .model(ModelChoice::Gemini15Flash)
//!         .page_limit(5)
//!         .build()?;
//!     let client = LlmInferenceClient::from_config(&config);
//!
//!     let output = analyze("104-10006-10247.pdf", &client, &config).await?;
//!     for page in &output.pages {
//!         println!("Page {}: {}", page.page_num, page.display_text());
//!     }
//!     if let Some(summary) = output.summary {
//!         println!("{summary}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | `doc-analyzer` binary (clap, anyhow, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc-analyzer = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! PDF rendering needs a pdfium shared library at runtime. It is looked up
//! via `PDFIUM_LIB_PATH`, then the working directory, then system library
//! paths. Image inputs do not need pdfium.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod run;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    pages_to_process, AnalysisConfig, AnalysisConfigBuilder, ModelChoice, SummaryPolicy,
};
pub use error::{AnalyzerError, InferenceError, PageError};
pub use inference::{InferenceClient, InferenceRequest, InferenceResponse, LlmInferenceClient};
pub use output::{
    AnalysisOutput, AnalysisResult, AnalysisSet, AnalysisStats, DocumentInfo, DocumentKind,
    RenderedImage, RunStatus,
};
pub use pipeline::input::Document;
pub use pipeline::render::{open_renderer, PageRenderer};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{Report, WrittenArtifacts};
pub use run::{
    analyze, analyze_document, analyze_sync, analyze_to_dir, analyze_with_renderer, inspect,
    run_pages,
};
pub use stream::{spawn_analysis, AnalysisEvent, AnalysisTask};
pub use tokio_util::sync::CancellationToken;
