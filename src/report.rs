//! Report building: per-page text, the combined report, and writing both to
//! disk.
//!
//! ```text
//! # Document Analysis: <filename>
//!
//! ## Summary
//!
//! <summary>
//!
//! ## Page-by-Page Analysis
//!
//! Page 1: <analysis>
//!
//! Page 2: <analysis>
//! ```
//!
//! Files are written atomically (temp file, then rename) so an interrupted
//! run never leaves a half-written report behind.

use crate::error::AnalyzerError;
use crate::output::{AnalysisOutput, AnalysisResult, AnalysisSet};
use crate::pipeline::summarize::aggregate_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// The combined downloadable artifact of a run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    source_filename: String,
    text: String,
}

impl Report {
    /// Full report: title, summary, then every page analysis in order.
    pub fn build(source_filename: &str, summary: &str, set: &AnalysisSet) -> Self {
        let text = format!(
            "# Document Analysis: {}\n\n## Summary\n\n{}\n\n## Page-by-Page Analysis\n\n{}",
            source_filename,
            summary,
            aggregate_text(set)
        );
        Self {
            source_filename: source_filename.to_string(),
            text,
        }
    }

    /// Report for a standalone image: the single page's analysis text.
    pub fn single_page(source_filename: &str, result: &AnalysisResult) -> Self {
        Self {
            source_filename: source_filename.to_string(),
            text: result.display_text().into_owned(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// `analysis_<sanitised source filename>.txt`
    pub fn file_name(&self) -> String {
        format!("analysis_{}.txt", sanitize_filename(&self.source_filename))
    }
}

/// Downloadable text for one page: `"# Analysis of Page <n>\n\n<text>"`.
pub fn page_report(result: &AnalysisResult) -> String {
    format!("# Analysis of Page {}\n\n{}", result.page_num, result.display_text())
}

pub fn page_report_file_name(page_num: usize) -> String {
    format!("analysis_page_{}.txt", page_num)
}

pub fn page_image_file_name(page_num: usize) -> String {
    format!("page_{}.png", page_num)
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = RE_UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Write `contents` to `path` atomically, creating parent directories.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), AnalyzerError> {
    let write_err = |e| AnalyzerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// Files written by [`write_artifacts`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct WrittenArtifacts {
    pub report: Option<PathBuf>,
    pub pages: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
}

/// Write the per-page reports, the full report (if any) and optionally the
/// page images into `dir`.
pub async fn write_artifacts(
    dir: &Path,
    output: &AnalysisOutput,
    save_images: bool,
) -> Result<WrittenArtifacts, AnalyzerError> {
    let mut written = WrittenArtifacts::default();

    for result in &output.pages {
        let path = dir.join(page_report_file_name(result.page_num));
        write_atomic(&path, page_report(result).as_bytes()).await?;
        written.pages.push(path);

        if save_images {
            let path = dir.join(page_image_file_name(result.page_num));
            write_atomic(&path, &result.image.png).await?;
            written.images.push(path);
        }
    }

    if let Some(ref report) = output.report {
        let path = dir.join(report.file_name());
        write_atomic(&path, report.text().as_bytes()).await?;
        written.report = Some(path);
    }

    info!(
        "Wrote {} page file(s){} to {}",
        written.pages.len(),
        if written.report.is_some() { " and the full report" } else { "" },
        dir.display()
    );
    Ok(written)
}
