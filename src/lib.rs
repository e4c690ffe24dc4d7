//! # edgequake-pdf2txt
//!
//! Extract text from scanned or image-only PDF documents, one page at a time.
//!
//! Each page is rasterised with pdfium and handed to a text recogniser (the
//! `tesseract` CLI or a vision-language model). Runs execute in the
//! background, report progress after every page, and can be cancelled
//! between pages; a cancelled run still yields the text of the pages it
//! finished.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise page i via pdfium (blocking thread)
//!  ├─ 3. Recognise  tesseract or VLM → text, failures become diagnostics
//!  ├─ 4. Accumulate ordered sections, "--- Page N ---" headers
//!  └─ 5. Output     sink write + exactly one terminal notification
//! ```
//!
//! Cancellation is checked before every page, so a run stops after at most
//! one more page once [`RunHandle::cancel`] is called.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2txt::{
//!     Coordinator, FileSink, NoopObserver, OcrConfig, PdfiumRenderer, RunOutcome,
//!     TesseractRecognizer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OcrConfig::builder().languages(["ko-KR", "en-US"]).build()?;
//!     let renderer = Arc::new(PdfiumRenderer::new(config.max_rendered_pixels)?);
//!     let recognizer = Arc::new(TesseractRecognizer::new().with_dpi(config.dpi));
//!     let coordinator = Coordinator::new(renderer, recognizer, config);
//!
//!     let run = coordinator.start(
//!         "scan.pdf",
//!         Arc::new(FileSink::new("output.txt")),
//!         Arc::new(NoopObserver),
//!     )?;
//!     match run.wait().await {
//!         RunOutcome::Completed(doc) => eprintln!("{} pages", doc.page_count()),
//!         RunOutcome::Cancelled(doc) => eprintln!("cancelled after {} pages", doc.page_count()),
//!         RunOutcome::Failed { error, .. } => eprintln!("failed: {error}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2txt` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2txt = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inspect;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationToken;
pub use config::{FailurePolicy, OcrConfig, OcrConfigBuilder, PageSeparator, VisionConfig};
pub use coordinator::{Coordinator, RunHandle};
pub use error::{OcrError, PageError, RecognitionError, RenderError};
pub use inspect::inspect;
pub use output::{DocumentInfo, DocumentText, PageResult, RunOutcome, RunSnapshot, RunStatus};
pub use pipeline::accumulate::ResultAccumulator;
pub use pipeline::recognize::{TesseractRecognizer, TextRecognizer, VisionRecognizer};
pub use pipeline::render::{DocumentHandle, DocumentRenderer, PdfiumRenderer, RasterImage};
pub use pipeline::runner::PagePipeline;
pub use progress::{NoopObserver, PageOutcome, PageProgress, PipelineEvent, RunObserver};
pub use sink::{FileSink, MemorySink, OutputSink};
