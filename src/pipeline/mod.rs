//! Pipeline stages for page-by-page document analysis.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the orchestrator in [`crate::run`] only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ page ──▶ summarize
//! (path/URL) (pdfium)  (base64)  (vision)  (text-only)
//! ```
//!
//! 1. [`input`]    : load a local file or URL and detect PDF vs image
//! 2. [`render`]   : rasterise one page at the configured scale; pdfium
//!    work runs in `spawn_blocking`
//! 3. [`encode`]   : PNG-encode and base64-wrap images for the request body
//! 4. [`page`]     : one multimodal call per page; failures become
//!    placeholders, never errors
//! 5. [`summarize`]: one text-only call over every page's analysis

pub mod encode;
pub mod input;
pub mod page;
pub mod render;
pub mod summarize;
