//! Rasterisation: turn one page of a document into a PNG-encoded image.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Every pdfium call runs on Tokio's blocking pool so the
//! runtime's worker threads never stall while a page is rendered.
//!
//! ## Why a temp file?
//!
//! Documents arrive as bytes (upload or download). pdfium opens them from a
//! file path, so the bytes are written to a [`ScopedTempDocument`] that is
//! deleted when the renderer is dropped, on success, error and panic alike.

use crate::error::AnalyzerError;
use crate::output::{DocumentKind, RenderedImage};
use crate::pipeline::encode::encode_png;
use crate::pipeline::input::Document;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The document-decoding capability the orchestrator drives.
///
/// Page indices are 0-based here; rendered images carry the 1-based page
/// number.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render page `page_index` with both axes multiplied by `scale`.
    ///
    /// Any failure is fatal for the run.
    async fn render(&self, page_index: usize, scale: f32) -> Result<RenderedImage, AnalyzerError>;
}

/// Open the renderer that matches the document's container type.
pub async fn open_renderer(
    document: &Document,
    password: Option<&str>,
) -> Result<Box<dyn PageRenderer>, AnalyzerError> {
    match document.kind() {
        DocumentKind::Pdf => Ok(Box::new(PdfiumRenderer::open(document, password).await?)),
        DocumentKind::Image => Ok(Box::new(ImageRenderer::new(document)?)),
    }
}

// ── Scoped temp storage ──────────────────────────────────────────────────

/// Document bytes written to a temp file that is removed on drop.
pub struct ScopedTempDocument {
    file: NamedTempFile,
}

impl ScopedTempDocument {
    /// Write `bytes` to a fresh temp file with the given suffix (e.g. `.pdf`).
    pub fn write(bytes: &[u8], suffix: &str) -> Result<Self, AnalyzerError> {
        let mut file = tempfile::Builder::new()
            .prefix("doc-analyzer-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| AnalyzerError::Internal(format!("tempfile: {e}")))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| AnalyzerError::Internal(format!("tempfile write: {e}")))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// ── PDF via pdfium ───────────────────────────────────────────────────────

/// Bind to a pdfium shared library.
///
/// Lookup order: `PDFIUM_LIB_PATH` (a library file or the directory holding
/// it), the current directory, then system library paths.
pub fn bind_pdfium() -> Result<Pdfium, AnalyzerError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| AnalyzerError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Renders PDF pages with pdfium from a scoped temp copy of the document.
pub struct PdfiumRenderer {
    filename: String,
    temp: ScopedTempDocument,
    password: Option<String>,
    page_count: usize,
}

impl PdfiumRenderer {
    /// Write the document to temp storage and open it once to validate it
    /// and read the page count.
    pub async fn open(document: &Document, password: Option<&str>) -> Result<Self, AnalyzerError> {
        let temp = ScopedTempDocument::write(document.bytes(), ".pdf")?;
        let path = temp.path().to_path_buf();
        let filename = document.filename().to_string();
        let pwd = password.map(str::to_string);

        let page_count = {
            let filename = filename.clone();
            tokio::task::spawn_blocking(move || {
                count_pages_blocking(&path, &filename, pwd.as_deref())
            })
            .await
            .map_err(|e| AnalyzerError::Internal(format!("Open task panicked: {}", e)))??
        };
        info!("PDF loaded: {} ({} pages)", filename, page_count);

        Ok(Self {
            filename,
            temp,
            password: password.map(str::to_string),
            page_count,
        })
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn render(&self, page_index: usize, scale: f32) -> Result<RenderedImage, AnalyzerError> {
        if page_index >= self.page_count {
            return Err(AnalyzerError::RenderFailed {
                page: page_index + 1,
                detail: format!("out of range (document has {} pages)", self.page_count),
            });
        }

        let path = self.temp.path().to_path_buf();
        let filename = self.filename.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            render_page_blocking(&path, &filename, password.as_deref(), page_index, scale)
        })
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Map a pdfium load failure onto the user-facing error.
fn open_error(filename: &str, password: Option<&str>, e: PdfiumError) -> AnalyzerError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            AnalyzerError::WrongPassword {
                filename: filename.to_string(),
            }
        } else {
            AnalyzerError::PasswordRequired {
                filename: filename.to_string(),
            }
        }
    } else {
        AnalyzerError::CorruptDocument {
            filename: filename.to_string(),
            detail: err_str,
        }
    }
}

fn count_pages_blocking(
    path: &Path,
    filename: &str,
    password: Option<&str>,
) -> Result<usize, AnalyzerError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| open_error(filename, password, e))?;
    Ok(document.pages().len() as usize)
}

fn render_page_blocking(
    path: &Path,
    filename: &str,
    password: Option<&str>,
    page_index: usize,
    scale: f32,
) -> Result<RenderedImage, AnalyzerError> {
    let page_num = page_index + 1;
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| open_error(filename, password, e))?;

    let pages = document.pages();
    let page = pages
        .get(page_index as u16)
        .map_err(|e| AnalyzerError::RenderFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| AnalyzerError::RenderFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    let png = encode_png(&image).map_err(|e| AnalyzerError::RenderFailed {
        page: page_num,
        detail: format!("PNG encoding failed: {}", e),
    })?;
    debug!(
        "Rendered page {} → {}x{} px ({} bytes PNG)",
        page_num,
        image.width(),
        image.height(),
        png.len()
    );

    Ok(RenderedImage {
        page_num,
        width: image.width(),
        height: image.height(),
        png,
    })
}

// ── Standalone image ─────────────────────────────────────────────────────

/// A standalone PNG/JPEG treated as a one-page document.
///
/// The image is sent as uploaded: no upscaling, since there is no vector
/// source to re-rasterise.
pub struct ImageRenderer {
    image: RenderedImage,
}

impl ImageRenderer {
    /// Decode the image once, failing early on corrupt data.
    pub fn new(document: &Document) -> Result<Self, AnalyzerError> {
        let decoded =
            image::load_from_memory(document.bytes()).map_err(|e| AnalyzerError::CorruptDocument {
                filename: document.filename().to_string(),
                detail: e.to_string(),
            })?;
        let png = encode_png(&decoded).map_err(|e| AnalyzerError::RenderFailed {
            page: 1,
            detail: format!("PNG encoding failed: {}", e),
        })?;
        debug!(
            "Decoded image {} → {}x{} px",
            document.filename(),
            decoded.width(),
            decoded.height()
        );
        Ok(Self {
            image: RenderedImage {
                page_num: 1,
                width: decoded.width(),
                height: decoded.height(),
                png,
            },
        })
    }
}

#[async_trait]
impl PageRenderer for ImageRenderer {
    fn page_count(&self) -> usize {
        1
    }

    async fn render(&self, page_index: usize, _scale: f32) -> Result<RenderedImage, AnalyzerError> {
        if page_index != 0 {
            return Err(AnalyzerError::RenderFailed {
                page: page_index + 1,
                detail: "an image document has a single page".into(),
            });
        }
        Ok(self.image.clone())
    }
}
