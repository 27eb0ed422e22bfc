//! Image encoding: raster → PNG bytes → base64 `ImageData` for the vision API.
//!
//! PNG is lossless, which keeps typewriter strokes, stamps and marginal
//! handwriting crisp. JPEG artefacts on rendered text degrade OCR accuracy.

use crate::output::RenderedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a raster.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap a rendered page as base64 PNG `ImageData`.
///
/// `detail: "high"` lets tiling models look at the full-resolution image;
/// fine print on scanned memos is lost in the low-detail overview.
pub fn to_image_data(image: &RenderedImage) -> ImageData {
    let b64 = STANDARD.encode(&image.png);
    debug!(
        "Page {}: encoded {}x{} image → {} bytes base64",
        image.page_num,
        image.width,
        image.height,
        b64.len()
    );
    ImageData::new(b64, "image/png").with_detail("high")
}
