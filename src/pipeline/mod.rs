//! Pipeline stages for page-by-page OCR.
//!
//! Each submodule owns one step. The [`runner`] drives them for one page at
//! a time; nothing here spawns threads or tasks.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ recognize ──▶ accumulate
//! (URL/path) (pdfium)  (tesseract|VLM)  (ordered text)
//! ```
//!
//! 1. [`input`]      — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]     — open the document and rasterise one page on demand
//! 3. [`recognize`]  — turn a raster into text; [`encode`] and [`postprocess`]
//!    support the engines
//! 4. [`accumulate`] — keep page results in index order and join them
//! 5. [`runner`]     — the page loop with cancellation checks and progress events

pub mod accumulate;
pub mod encode;
pub mod input;
pub mod postprocess;
pub mod recognize;
pub mod render;
pub mod runner;
