//! End-to-end tests against real documents and a live model.
//!
//! These use files in `./test_cases/` and make real LLM API calls. They are
//! gated behind `E2E_ENABLED` so they do not run in CI unless explicitly
//! requested. PDF tests also need pdfium (`PDFIUM_LIB_PATH`).
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use edgequake_doc_analyzer::{
    analyze, analyze_to_dir, inspect, AnalysisConfig, AnalyzerError, DocumentKind,
    LlmInferenceClient, ModelChoice, RunStatus,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Skip this test when no model credentials are available.
macro_rules! skip_without_llm_key {
    () => {{
        let has_key = ["GEMINI_API_KEY", "OPENAI_API_KEY", "ANTHROPIC_API_KEY"]
            .iter()
            .any(|k| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false));
        if !has_key {
            println!("SKIP: no LLM API key in the environment");
            return;
        }
    }};
}

fn live_config(limit: usize) -> AnalysisConfig {
    AnalysisConfig::builder()
        .model(ModelChoice::Gemini15Flash)
        .page_limit(limit)
        .build()
        .expect("valid config")
}

// ── Inspect tests (no LLM) ───────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_declassified_memo() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("declassified_memo.pdf"));

    let info = inspect(path.to_str().unwrap(), &AnalysisConfig::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(info.kind, DocumentKind::Pdf);
    assert!(info.page_count > 0, "memo should have pages");
    assert_eq!(info.filename, "declassified_memo.pdf");

    println!("Info: {:?} ({})", info, info.size_display());
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let err = inspect("/definitely/not/a/real/file.pdf", &AnalysisConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::FileNotFound { .. }), "got {err:?}");
}

// ── Live analysis tests (need an LLM API key) ────────────────────────────────

/// First two pages of a scanned memo: two page analyses, one summary, one
/// report with both pages in order.
#[tokio::test]
async fn test_analyze_memo_first_two_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("declassified_memo.pdf"));
    skip_without_llm_key!();

    let config = live_config(2);
    let client = LlmInferenceClient::from_config(&config);
    let output = analyze(path.to_str().unwrap(), &client, &config)
        .await
        .expect("analysis should succeed");

    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.pages.len(), output.document.page_count.min(2));
    assert_eq!(output.pages.failed_pages(), Vec::<usize>::new());

    let summary = output.summary.as_deref().expect("summary");
    assert!(!summary.trim().is_empty());

    let report = output.report.as_ref().expect("report");
    assert!(report.text().starts_with("# Document Analysis: declassified_memo.pdf"));
    assert!(report.text().contains("Page 1: "));

    println!("{}", report.text());
    println!(
        "Tokens: {} in / {} out, {}ms",
        output.stats.total_input_tokens,
        output.stats.total_output_tokens,
        output.stats.total_duration_ms
    );
}

/// A scanned page image is analysed as a single page with no summary call.
#[tokio::test]
async fn test_analyze_scanned_image() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_cable.png"));
    skip_without_llm_key!();

    let config = live_config(5);
    let client = LlmInferenceClient::from_config(&config);
    let output = analyze(path.to_str().unwrap(), &client, &config)
        .await
        .expect("analysis should succeed");

    assert_eq!(output.document.kind, DocumentKind::Image);
    assert_eq!(output.pages.len(), 1);
    assert!(output.summary.is_none());
    let report = output.report.expect("single-page report");
    assert_eq!(report.text(), output.pages.as_slice()[0].display_text());
}

/// Artifacts land in the output directory with the expected names.
#[tokio::test]
async fn test_analyze_to_dir_writes_report() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("declassified_memo.pdf"));
    skip_without_llm_key!();

    let dir = tempfile::tempdir().unwrap();
    let config = live_config(1);
    let client = LlmInferenceClient::from_config(&config);
    let (output, written) =
        analyze_to_dir(path.to_str().unwrap(), dir.path(), &client, &config, true)
            .await
            .expect("analysis should succeed");

    let report_path = written.report.expect("report written");
    assert_eq!(
        report_path.file_name().unwrap().to_str().unwrap(),
        "analysis_declassified_memo.pdf.txt"
    );
    let on_disk = std::fs::read_to_string(&report_path).unwrap();
    assert_eq!(on_disk, output.report.unwrap().text());
    assert_eq!(written.pages.len(), 1);
    assert_eq!(written.images.len(), 1);
}
