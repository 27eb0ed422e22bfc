//! Orchestration and top-level entry points.
//!
//! [`run_pages`] is the orchestrator proper: it walks pages
//! `1..=pages_to_process` strictly in order, rendering then analysing each
//! one. The `analyze*` functions wrap it with document loading, the summary
//! step and report building.
//!
//! A render failure aborts the run with no results. A failed inference call
//! on a page only costs that page.

use crate::config::{pages_to_process, AnalysisConfig, SummaryPolicy};
use crate::error::{AnalyzerError, InferenceError, SUMMARY_ERROR_PREFIX};
use crate::inference::InferenceClient;
use crate::output::{
    AnalysisOutput, AnalysisSet, AnalysisStats, DocumentInfo, DocumentKind, RunStatus,
};
use crate::pipeline::input::{self, Document};
use crate::pipeline::page::analyze_page;
use crate::pipeline::render::{open_renderer, PageRenderer};
use crate::pipeline::summarize::summarize;
use crate::report::{write_artifacts, Report, WrittenArtifacts};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Render and analyse pages `1..=pages_to_process(limit, page_count)` in
/// order, returning the ordered result set.
///
/// Any render error (or cancellation) returns `Err` and discards every
/// result collected so far.
pub async fn run_pages(
    renderer: &dyn PageRenderer,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<AnalysisSet, AnalyzerError> {
    run_pages_timed(renderer, client, config, cancel)
        .await
        .map(|(set, _)| set)
}

/// [`run_pages`] plus the time spent rendering, in milliseconds.
async fn run_pages_timed(
    renderer: &dyn PageRenderer,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<(AnalysisSet, u64), AnalyzerError> {
    let total = pages_to_process(config.page_limit, renderer.page_count());
    let model_id = config.model.id();
    let instruction = config.instruction();
    let cb = config.progress_callback.as_deref();

    info!(
        "Analysing {} of {} page(s) with {}",
        total,
        renderer.page_count(),
        model_id
    );
    if let Some(cb) = cb {
        cb.on_run_start(total);
    }

    let mut set = AnalysisSet::with_capacity(total);
    let mut render_ms = 0u64;

    for index in 0..total {
        let page_num = index + 1;
        if cancel.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }
        if let Some(cb) = cb {
            cb.on_page_start(page_num, total);
        }

        let render_start = Instant::now();
        let image = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
            rendered = renderer.render(index, config.render_scale) => rendered?,
        };
        render_ms += render_start.elapsed().as_millis() as u64;
        if image.page_num != page_num {
            return Err(AnalyzerError::RenderFailed {
                page: page_num,
                detail: format!("renderer returned page {} instead", image.page_num),
            });
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
            result = analyze_page(client, Arc::new(image), instruction, model_id) => result,
        };

        if let Some(cb) = cb {
            match result.error() {
                None => cb.on_page_complete(page_num, total, result.display_text().len()),
                Some(e) => cb.on_page_error(page_num, total, e.to_string()),
            }
            cb.on_progress(page_num as f32 / total as f32);
        }
        set.push(result)?;
    }

    debug!("Rendering took {}ms across {} page(s)", render_ms, total);
    if let Some(cb) = cb {
        cb.on_run_complete(total, set.succeeded());
    }
    Ok((set, render_ms))
}

/// Analyse an already-loaded document.
///
/// Returns `Ok` whenever every target page was processed, even when some
/// page calls failed (see [`AnalysisStats::failed_pages`]) or, under
/// [`SummaryPolicy::Surface`], when the summary call failed (see
/// [`AnalysisOutput::summary_error`]; [`AnalysisOutput::into_result`] turns
/// that into an error).
pub async fn analyze_document(
    document: &Document,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    execute(document, client, config, &CancellationToken::new()).await
}

pub(crate) async fn execute(
    document: &Document,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<AnalysisOutput, AnalyzerError> {
    info!("Starting analysis: {} ({} bytes)", document.filename(), document.size_bytes());

    let renderer = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
        opened = open_renderer(document, config.password.as_deref()) => opened?,
    };
    let info = document.info(renderer.page_count());
    complete_run(renderer.as_ref(), info, client, config, cancel).await
}

/// Analyse a document through an already-opened renderer.
///
/// `document` describes what `renderer` decodes; its `kind` decides whether
/// a summary is made (PDF) or the single page is the report (image).
pub async fn analyze_with_renderer(
    renderer: &dyn PageRenderer,
    document: DocumentInfo,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    complete_run(renderer, document, client, config, &CancellationToken::new()).await
}

async fn complete_run(
    renderer: &dyn PageRenderer,
    info: DocumentInfo,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<AnalysisOutput, AnalyzerError> {
    let total_start = Instant::now();
    let model_id = config.model.id();

    // ── Step 1: Make sure the model can be reached ───────────────────────
    if pages_to_process(config.page_limit, info.page_count) > 0 {
        client.prepare(model_id).map_err(|e| match e {
            InferenceError::NotConfigured { provider, hint } => {
                AnalyzerError::ProviderNotConfigured { provider, hint }
            }
            other => AnalyzerError::ProviderNotConfigured {
                provider: model_id.to_string(),
                hint: other.to_string(),
            },
        })?;
    }

    // ── Step 2: Page loop ────────────────────────────────────────────────
    let (pages, render_duration_ms) = run_pages_timed(renderer, client, config, cancel).await?;

    // ── Step 3: Summary and report ───────────────────────────────────────
    let mut summary = None;
    let mut summary_error = None;
    let mut report = None;

    if pages.is_empty() {
        info!("No pages to analyse; skipping summary");
    } else if info.kind == DocumentKind::Image {
        match pages.get(1) {
            Some(page) if page.is_error() => {
                warn!("Image analysis failed; no report will be produced");
            }
            Some(page) => report = Some(Report::single_page(&info.filename, page)),
            None => {}
        }
    } else {
        if let Some(ref cb) = config.progress_callback {
            cb.on_summary_start();
        }
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalyzerError::Cancelled),
            outcome = summarize(client, &pages, model_id) => outcome,
        };
        match outcome {
            Ok(text) => {
                report = Some(Report::build(&info.filename, &text, &pages));
                summary = Some(text);
            }
            Err(AnalyzerError::SummaryFailed { detail }) => match config.summary_policy {
                SummaryPolicy::Surface => {
                    warn!("Summary failed; no report will be produced");
                    summary_error = Some(detail);
                }
                SummaryPolicy::Tolerate => {
                    let text = format!("{SUMMARY_ERROR_PREFIX}{detail}");
                    report = Some(Report::build(&info.filename, &text, &pages));
                    summary = Some(text);
                    summary_error = Some(detail);
                }
            },
            Err(other) => return Err(other),
        }
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = AnalysisStats {
        total_pages: info.page_count,
        processed_pages: pages.len(),
        failed_pages: pages.failed_pages().len(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        inference_duration_ms: pages.iter().map(|p| p.duration_ms).sum(),
    };

    info!(
        "Analysis complete: {}/{} page(s) answered, {}ms total",
        pages.succeeded(),
        pages.len(),
        stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        document: info,
        status: RunStatus::Completed,
        pages,
        summary,
        summary_error,
        report,
        stats,
    })
}

/// Analyse a local file path or HTTP(S) URL.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc_analyzer::{analyze, AnalysisConfig, LlmInferenceClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalysisConfig::builder().page_limit(5).build()?;
/// let client = LlmInferenceClient::from_config(&config);
/// let output = analyze("104-10006-10247.pdf", &client, &config).await?;
/// if let Some(report) = output.report {
///     println!("{}", report.text());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    input_str: impl AsRef<str>,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    analyze_document(&document, client, config).await
}

/// Analyse a document and write its artifacts into `output_dir`.
///
/// Per-page files are written even when the summary failed; the full
/// report only when one was built.
pub async fn analyze_to_dir(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
    save_images: bool,
) -> Result<(AnalysisOutput, WrittenArtifacts), AnalyzerError> {
    let output = analyze(input_str, client, config).await?;
    let written = write_artifacts(output_dir.as_ref(), &output, save_images).await?;
    Ok((output, written))
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    client: &dyn InferenceClient,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalyzerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, client, config))
}

/// Load a document and report its identity and page count.
///
/// Uses the password and download timeout of `config`. Does not require an
/// LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<DocumentInfo, AnalyzerError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let renderer = open_renderer(&document, config.password.as_deref()).await?;
    Ok(document.info(renderer.page_count()))
}
