//! Renderer adapter: open a document, rasterise one page at a time.
//!
//! ## Why one page at a time?
//!
//! The pipeline must be able to stop between any two pages, and a rendered
//! 300-DPI page is tens of megabytes. Rendering lazily keeps at most one
//! bitmap alive and lets cancellation skip the rendering of every page that
//! was never reached.
//!
//! ## Threading
//!
//! pdfium uses thread-local state and must not be driven from async
//! contexts; the coordinator opens the document and runs the page loop
//! inside `spawn_blocking`. [`PdfiumRenderer`] is `Send + Sync` through the
//! `sync` feature of `pdfium-render`, which also serialises every call into
//! the library, so one renderer can back any number of runs.

use crate::error::{OcrError, RenderError};
use crate::output::DocumentInfo;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Decoded pixels for exactly one page. Dropped right after recognition.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub page_index: usize,
    pub image: DynamicImage,
}

impl RasterImage {
    pub fn new(page_index: usize, image: DynamicImage) -> Self {
        Self { page_index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An opened document. Lives for the duration of one run.
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Rasterise page `page_index` (0-indexed) at `dpi`.
    fn render_page(&self, page_index: usize, dpi: u32) -> Result<RasterImage, RenderError>;
}

/// Opens documents for rendering.
pub trait DocumentRenderer: Send + Sync {
    /// Open `path`. Failures here are fatal setup errors.
    fn open<'a>(
        &'a self,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<Box<dyn DocumentHandle + 'a>, OcrError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`DocumentRenderer`] backed by the pdfium library.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
    max_rendered_pixels: u32,
}

impl PdfiumRenderer {
    /// Bind to pdfium, preferring a library next to the working directory
    /// and falling back to the system-wide one.
    pub fn new(max_rendered_pixels: u32) -> Result<Self, OcrError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| OcrError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            max_rendered_pixels,
        })
    }

    /// Read page count and metadata without rendering anything.
    pub fn document_info(
        &self,
        path: &Path,
        password: Option<&str>,
    ) -> Result<DocumentInfo, OcrError> {
        let document = load_document(&self.pdfium, path, password)?;
        let metadata = document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentInfo {
            page_count: document.pages().len() as usize,
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            pdf_version: format!("{:?}", document.version()),
        })
    }
}

impl DocumentRenderer for PdfiumRenderer {
    fn open<'a>(
        &'a self,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<Box<dyn DocumentHandle + 'a>, OcrError> {
        let document = load_document(&self.pdfium, path, password)?;
        let page_count = document.pages().len() as usize;
        info!("PDF loaded: {} pages", page_count);
        Ok(Box::new(PdfiumDocument {
            document,
            page_count,
            max_rendered_pixels: self.max_rendered_pixels,
        }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
    max_rendered_pixels: u32,
}

impl DocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, page_index: usize, dpi: u32) -> Result<RasterImage, RenderError> {
        if page_index >= self.page_count {
            return Err(RenderError(format!(
                "page index {} out of range (document has {} pages)",
                page_index, self.page_count
            )));
        }

        let page = self
            .document
            .pages()
            .get(page_index as u16)
            .map_err(|e| RenderError(format!("{:?}", e)))?;

        let (width, _) = target_size(
            page.width().value,
            page.height().value,
            dpi,
            self.max_rendered_pixels,
        );
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_index + 1,
            image.width(),
            image.height()
        );
        Ok(RasterImage::new(page_index, image))
    }
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, OcrError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                OcrError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                OcrError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            OcrError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Pixel size of a page of `width_pts` × `height_pts` points at `dpi`,
/// scaled down proportionally so neither edge exceeds `max_pixels`.
pub fn target_size(width_pts: f32, height_pts: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    let mut w = (width_pts * scale).round().max(1.0);
    let mut h = (height_pts * scale).round().max(1.0);
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w = (w * shrink).round().max(1.0);
        h = (h * shrink).round().max(1.0);
    }
    (w as u32, h as u32)
}
