//! Error types for the edgequake-pdf2txt library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`OcrError`] — **Fatal**: the run cannot proceed at all (missing file,
//!   wrong password, pdfium unavailable, output target busy). Delivered as
//!   [`crate::RunOutcome::Failed`] or returned synchronously from
//!   [`crate::Coordinator::start`].
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be rasterised or
//!   recognised. Stored inside [`crate::PageResult`]; the page still gets a
//!   section in the output, holding a diagnostic line instead of text.
//!
//! The adapter-level errors [`RenderError`] and [`RecognitionError`] carry no
//! page number; the pipeline attaches it when it turns them into a
//! [`PageError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2txt library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path nor a valid URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The document cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the executable or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    /// A page failed to render and the failure policy is `Abort`.
    #[error("Run aborted: page {page} could not be rendered: {detail}")]
    PageAborted { page: usize, detail: String },

    // ── Coordination errors ───────────────────────────────────────────────
    /// A run against the same output target is still in progress.
    #[error("A run is already in progress for output '{target}'")]
    CoordinatorBusy { target: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Page numbers are 1-indexed, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The recogniser could not produce text for the page.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::RecognitionFailed { page, .. } => {
                *page
            }
        }
    }

    /// Diagnostic line embedded in the output text in place of the page content.
    pub fn diagnostic(&self) -> String {
        match self {
            PageError::RenderFailed { page, detail } => {
                format!("[ERROR] render failed: page {page}: {detail}")
            }
            PageError::RecognitionFailed { page, detail } => {
                format!("[ERROR] OCR failed: page {page}: {detail}")
            }
        }
    }
}

/// A page could not be rasterised.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// The recogniser could not produce text from an image.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The engine ran but reported failure.
    #[error("{engine} failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    /// The engine could not be started at all (missing binary, no provider).
    #[error("{engine} unavailable: {detail}")]
    Unavailable { engine: String, detail: String },

    /// The image could not be handed to the engine.
    #[error("image encoding failed: {0}")]
    Encoding(String),
}

impl RenderError {
    pub(crate) fn into_page_error(self, page_index: usize) -> PageError {
        PageError::RenderFailed {
            page: page_index + 1,
            detail: self.0,
        }
    }
}

impl RecognitionError {
    pub(crate) fn into_page_error(self, page_index: usize) -> PageError {
        PageError::RecognitionFailed {
            page: page_index + 1,
            detail: self.to_string(),
        }
    }
}
