//! Input resolution: load a local path or URL into an in-memory [`Document`].
//!
//! Documents are held as bytes for the whole run. The renderer decides how
//! to decode them (pdfium needs a file on disk and gets a scoped temp file;
//! images decode straight from memory). The container type is detected from
//! magic bytes up front so an unsupported upload fails before any model call.

use crate::error::AnalyzerError;
use crate::output::{DocumentInfo, DocumentKind};
use std::path::Path;
use tracing::{debug, info};

/// An uploaded document: immutable bytes plus identity.
#[derive(Clone)]
pub struct Document {
    filename: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("kind", &self.kind)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap raw bytes, detecting whether they hold a PDF or an image.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AnalyzerError> {
        let filename = filename.into();
        let kind = detect_kind(&bytes).ok_or_else(|| AnalyzerError::UnsupportedFormat {
            filename: filename.clone(),
            magic: bytes.iter().take(8).copied().collect(),
        })?;
        debug!("Loaded {} ({:?}, {} bytes)", filename, kind, bytes.len());
        Ok(Self {
            filename,
            kind,
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Identity of this document once its page count is known.
    pub fn info(&self, page_count: usize) -> DocumentInfo {
        DocumentInfo {
            filename: self.filename.clone(),
            size_bytes: self.size_bytes(),
            kind: self.kind,
            page_count,
        }
    }
}

/// Detect the container type from the leading bytes.
pub fn detect_kind(bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(DocumentKind::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) | Ok(image::ImageFormat::Jpeg) => Some(DocumentKind::Image),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file path or download an HTTP(S) URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, AnalyzerError> {
    if input.trim().is_empty() {
        return Err(AnalyzerError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<Document, AnalyzerError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AnalyzerError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => AnalyzerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => AnalyzerError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local document: {}", path.display());
    Document::from_bytes(filename, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, AnalyzerError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalyzerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalyzerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalyzerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::from_bytes(filename_from_url(url), bytes.to_vec())
}

/// Last path segment of a URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
