//! Observer contract for run progress and terminal status.
//!
//! Pass an [`Arc<dyn RunObserver>`] to [`crate::Coordinator::start`] to
//! receive events while the run executes in the background. Notifications are
//! delivered by a dispatcher task, never from the thread that renders and
//! recognises pages, and always in page order.
//!
//! Every run ends with exactly one of [`RunObserver::on_completed`],
//! [`RunObserver::on_cancelled`] or [`RunObserver::on_failed`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2txt::{PageOutcome, RunObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     pages: AtomicUsize,
//! }
//!
//! impl RunObserver for CountingObserver {
//!     fn on_progress(&self, page_index: usize, total_pages: usize, _outcome: &PageOutcome) {
//!         let done = self.pages.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {} of {} ({} done)", page_index + 1, total_pages, done);
//!     }
//! }
//! ```

use crate::error::{OcrError, PageError};
use crate::output::PageResult;
use serde::{Deserialize, Serialize};

/// Receives run events. All methods default to no-ops.
///
/// Implementations must be `Send + Sync`: the dispatcher task that calls them
/// may run on any runtime worker thread.
pub trait RunObserver: Send + Sync {
    /// Called once the document is open and its page count is known.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page is appended to the result.
    ///
    /// # Arguments
    /// * `page_index`  — 0-indexed page that just finished
    /// * `total_pages` — pages in the document
    /// * `outcome`     — whether the page produced text
    fn on_progress(&self, page_index: usize, total_pages: usize, outcome: &PageOutcome) {
        let _ = (page_index, total_pages, outcome);
    }

    /// The run processed every page. `text` is the full document text.
    fn on_completed(&self, text: &str) {
        let _ = text;
    }

    /// The run was cancelled. `partial_text` covers the pages done before it.
    fn on_cancelled(&self, partial_text: &str) {
        let _ = partial_text;
    }

    /// The run failed.
    fn on_failed(&self, error: &OcrError) {
        let _ = error;
    }
}

/// Observer for callers that only want the final [`crate::RunOutcome`].
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOutcome {
    /// Text was recognised; `chars` is its length in characters.
    Recognized { chars: usize },
    /// The page holds a diagnostic placeholder.
    Failed(PageError),
}

impl PageOutcome {
    pub fn of(result: &PageResult) -> Self {
        match &result.error {
            None => PageOutcome::Recognized {
                chars: result.text.chars().count(),
            },
            Some(e) => PageOutcome::Failed(e.clone()),
        }
    }
}

/// Progress for one finished page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProgress {
    pub page_index: usize,
    pub total_pages: usize,
    pub outcome: PageOutcome,
}

/// Events emitted by [`crate::pipeline::runner::PagePipeline::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Emitted once, before the first cancellation check.
    Started { total_pages: usize },
    /// Emitted after each page is appended.
    Page(PageProgress),
}
