//! CLI binary for edgequake-doc-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs the analysis on a background task and prints or
//! writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc_analyzer::pipeline::input::resolve_input;
use edgequake_doc_analyzer::prompts::QUICK_LOOK_PROMPT;
use edgequake_doc_analyzer::report::{page_report, write_artifacts};
use edgequake_doc_analyzer::{
    inspect, spawn_analysis, AnalysisConfig, AnalysisOutput, AnalysisProgressCallback,
    AnalyzerError, DocumentKind, InferenceClient, LlmInferenceClient, ModelChoice, ProgressCallback,
    SummaryPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &[
    "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿",
];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner-only until `on_run_start` tells us how many pages to expect.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analysing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let elapsed = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let elapsed = self.elapsed_secs(page_num);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_summary_start(&self) {
        self.bar.set_prefix("Summarising");
        self.bar.set_message("cross-page summary");
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            self.bar.println(format!(
                "{} {} page(s) analysed",
                green("✔"),
                bold(&success_count.to_string())
            ));
        } else {
            self.bar.println(format!(
                "{} {}/{} page(s) analysed  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            ));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse the first 5 pages (default) and print the report
  doc-analyzer 104-10006-10247.pdf

  # Every page, write per-page files, the full report and page images
  doc-analyzer --max-pages 0 -o reports/ --save-images 104-10006-10247.pdf

  # Analyse straight from a URL with a stronger model
  doc-analyzer --model gemini-1.5-pro https://www.archives.gov/files/research/jfk/releases/2025/0318/104-10006-10247.pdf

  # Quick description of a single photograph
  doc-analyzer --quick photo.jpg

  # Custom instruction from a file, JSON output
  doc-analyzer --prompt-file names_only.txt --json memo.pdf > memo.json

  # Page count only (no API key needed)
  doc-analyzer --inspect-only memo.pdf

MODELS:
  gemini-1.5-flash (default)   fast, cheap
  gemini-1.5-pro               strongest reading of poor scans
  gemini-pro-vision            legacy vision model
  gemini-2.0-flash             newer fast model
  Any other id (gpt-4.1-mini, claude-sonnet-4-20250514, llava, ...) is passed
  through to the selected provider.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)

OUTPUT FILES (-o DIR):
  analysis_page_<n>.txt     one per analysed page
  analysis_<filename>.txt   summary + page-by-page report
  page_<n>.png              page images (--save-images)
"#;

/// Analyse scanned documents page by page with Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doc-analyzer",
    version,
    about = "Analyse scanned documents page by page with Vision LLMs",
    long_about = "Render each page of a PDF (or a single PNG/JPEG) to an image, ask a vision \
model to analyse it, then produce a cross-page summary and a combined report. Supports Google \
Gemini, OpenAI, Anthropic and any provider edgequake-llm knows about.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PNG/JPEG path or HTTP/HTTPS URL.
    input: String,

    /// Model ID: gemini-1.5-flash, gemini-1.5-pro, gemini-pro-vision, gemini-2.0-flash,
    /// or any provider model.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = "gemini-1.5-flash")]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ollama. Auto-detected if not set.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum number of pages to analyse (0 = all pages).
    #[arg(long, env = "DOC_ANALYZER_MAX_PAGES", default_value_t = 5)]
    max_pages: usize,

    /// Custom analysis instruction sent with every page.
    #[arg(long, env = "DOC_ANALYZER_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the analysis instruction from a text file.
    #[arg(long, env = "DOC_ANALYZER_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Use a short "What is this image?" instruction.
    #[arg(long, conflicts_with_all = ["prompt", "prompt_file"])]
    quick: bool,

    /// Write per-page files and the full report into this directory.
    #[arg(short, long = "output-dir", env = "DOC_ANALYZER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also save rendered page images (requires --output-dir).
    #[arg(long, requires = "output_dir")]
    save_images: bool,

    /// Output structured JSON (AnalysisOutput) instead of text.
    #[arg(long, env = "DOC_ANALYZER_JSON")]
    json: bool,

    /// What to do when the summary call fails.
    #[arg(long, env = "DOC_ANALYZER_SUMMARY_POLICY", value_enum, default_value = "surface")]
    summary_policy: SummaryPolicyArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC_ANALYZER_PASSWORD")]
    password: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC_ANALYZER_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC_ANALYZER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Disable progress bar.
    #[arg(long, env = "DOC_ANALYZER_NO_PROGRESS")]
    no_progress: bool,

    /// Print document identity and page count only, no analysis.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC_ANALYZER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC_ANALYZER_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC_ANALYZER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SummaryPolicyArg {
    /// Report a failed summary as an error; no full report.
    Surface,
    /// Put the error text in place of the summary and still build the report.
    Tolerate,
}

impl From<SummaryPolicyArg> for SummaryPolicy {
    fn from(v: SummaryPolicyArg) -> Self {
        match v {
            SummaryPolicyArg::Surface => SummaryPolicy::Surface,
            SummaryPolicyArg::Tolerate => SummaryPolicy::Tolerate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters, so library
    // INFO logs are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:   {}", info.filename);
            println!("Size:   {}", info.size_display());
            println!("Kind:   {:?}", info.kind);
            println!("Pages:  {}", info.page_count);
        }
        return Ok(());
    }

    // ── Build config and client ──────────────────────────────────────────
    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb = cli_progress
        .as_ref()
        .map(|cb| Arc::clone(cb) as Arc<dyn AnalysisProgressCallback>);
    let config = build_config(&cli, progress_cb).await?;
    let client: Arc<dyn InferenceClient> = Arc::new(LlmInferenceClient::from_config(&config));

    let document = resolve_input(&cli.input, config.download_timeout_secs)
        .await
        .context("Failed to load document")?;
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(document.filename()),
            dim(&document.info(0).size_display())
        );
    }

    // ── Run analysis (Ctrl-C cancels) ────────────────────────────────────
    let task = spawn_analysis(document, client, config);
    let cancel = task.cancellation_token();
    let result = tokio::select! {
        result = task.join() => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(AnalyzerError::Cancelled)
        }
    };
    if let Some(ref cb) = cli_progress {
        cb.bar.finish_and_clear();
    }
    let output = result.context("Analysis failed")?;

    // ── Emit results ─────────────────────────────────────────────────────
    if let Some(ref dir) = cli.output_dir {
        let written = write_artifacts(dir, &output, cli.save_images)
            .await
            .context("Failed to write output files")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} page file(s){}  →  {}",
                green("✔"),
                written.pages.len(),
                if written.report.is_some() { " + report" } else { "" },
                bold(&dir.display().to_string()),
            );
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output_dir.is_none() {
        print_text(&output)?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  ·  {}ms total",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }

    if let Some(ref detail) = output.summary_error {
        if output.report.is_none() {
            anyhow::bail!("Error generating summary: {detail}");
        }
    }
    if output.document.kind == DocumentKind::Image {
        if let Some(err) = output.pages.get(1).and_then(|page| page.error()) {
            anyhow::bail!("Error analyzing image: {err}");
        }
    }
    Ok(())
}

/// Print the full report, or the per-page analyses when there is none.
fn print_text(output: &AnalysisOutput) -> Result<()> {
    let text = match output.report {
        Some(ref report) => report.text().to_string(),
        None => output
            .pages
            .iter()
            .map(page_report)
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let model: ModelChoice = cli.model.parse().context("Invalid --model")?;

    let instruction = if let Some(ref path) = cli.prompt_file {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else if cli.quick {
        Some(QUICK_LOOK_PROMPT.to_string())
    } else {
        cli.prompt.clone()
    };

    let mut builder = AnalysisConfig::builder()
        .model(model)
        .page_limit(cli.max_pages)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .summary_policy(cli.summary_policy.into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(instruction) = instruction {
        builder = builder.instruction(instruction);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
