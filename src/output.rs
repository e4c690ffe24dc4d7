//! Result types: per-page results, assembled documents, run outcomes.

use crate::error::{OcrError, PageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of processing one page. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-indexed page position in the document.
    pub page_index: usize,
    /// Recognised text, or the diagnostic line when `error` is set.
    pub text: String,
    /// Why the page has no recognised text, if it has none.
    pub error: Option<PageError>,
    /// Wall-clock time spent rendering and recognising the page.
    pub duration_ms: u64,
}

impl PageResult {
    pub fn recognized(page_index: usize, text: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            page_index,
            text: text.into(),
            error: None,
            duration_ms,
        }
    }

    /// A placeholder result whose text is the error's diagnostic line.
    pub fn failed(page_index: usize, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_index,
            text: error.diagnostic(),
            error: Some(error),
            duration_ms,
        }
    }

    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered document text: the joined output plus the pages it was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentText {
    pub text: String,
    pub pages: Vec<PageResult>,
}

impl DocumentText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_ok()).count()
    }
}

/// Terminal outcome of one run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every page was attempted.
    Completed(DocumentText),
    /// Cancellation was requested; carries the pages finished before it.
    Cancelled(DocumentText),
    /// The run failed. `partial` holds pages finished before an abort (also
    /// written to the sink), and is `None` for setup failures where no page
    /// was processed.
    Failed {
        error: Arc<OcrError>,
        partial: Option<DocumentText>,
    },
}

impl RunOutcome {
    pub(crate) fn failed(error: OcrError) -> Self {
        RunOutcome::Failed {
            error: Arc::new(error),
            partial: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed(_) => RunStatus::Completed,
            RunOutcome::Cancelled(_) => RunStatus::Cancelled,
            RunOutcome::Failed { error, .. } => RunStatus::Failed(error.to_string()),
        }
    }

    /// The document text carried by the outcome, if any.
    pub fn document(&self) -> Option<&DocumentText> {
        match self {
            RunOutcome::Completed(doc) | RunOutcome::Cancelled(doc) => Some(doc),
            RunOutcome::Failed { partial, .. } => partial.as_ref(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

/// Run lifecycle status as seen from outside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Completed,
    Cancelled,
    Failed(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

/// Point-in-time view of a run, published after every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Pages appended so far (equals the index of the next page to process).
    pub pages_done: usize,
    /// Page count, 0 until the document has been opened.
    pub total_pages: usize,
    pub status: RunStatus,
}

impl RunSnapshot {
    pub fn pending() -> Self {
        Self {
            pages_done: 0,
            total_pages: 0,
            status: RunStatus::Pending,
        }
    }
}

/// Document metadata read without running OCR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_page_carries_diagnostic_text() {
        let err = PageError::RecognitionFailed {
            page: 2,
            detail: "blank".into(),
        };
        let page = PageResult::failed(1, err, 12);
        assert!(!page.is_ok());
        assert_eq!(page.page_num(), 2);
        assert!(page.text.contains("[ERROR] OCR failed: page 2"));
    }

    #[test]
    fn outcome_status_mapping() {
        let done = RunOutcome::Completed(DocumentText::default());
        assert_eq!(done.status(), RunStatus::Completed);
        assert!(done.document().is_some());

        let cancelled = RunOutcome::Cancelled(DocumentText::default());
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.status(), RunStatus::Cancelled);

        let failed = RunOutcome::failed(OcrError::Internal("boom".into()));
        assert!(matches!(failed.status(), RunStatus::Failed(ref r) if r.contains("boom")));
        assert!(failed.document().is_none());
    }

    #[test]
    fn pending_is_not_terminal() {
        assert!(!RunSnapshot::pending().status.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }
}
