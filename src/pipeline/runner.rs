//! The page loop: render → recognise → accumulate, one page at a time.
//!
//! Pages are processed strictly in ascending index order on the calling
//! thread. The cancellation token is checked before every page, including
//! the first, and nowhere else: a render or recognition call in flight
//! always runs to completion, so cancellation latency is at most one page.
//!
//! A page that fails to recognise never stops the run; it becomes a
//! diagnostic placeholder so page numbering in the output stays contiguous.
//! A page that fails to render does the same under
//! [`FailurePolicy::Continue`] and ends the run under
//! [`FailurePolicy::Abort`].

use super::accumulate::ResultAccumulator;
use super::recognize::TextRecognizer;
use super::render::{DocumentHandle, RasterImage};
use crate::cancel::CancellationToken;
use crate::config::{FailurePolicy, OcrConfig};
use crate::error::OcrError;
use crate::output::{PageResult, RunOutcome};
use crate::progress::{PageOutcome, PageProgress, PipelineEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one document through the recogniser.
#[derive(Clone)]
pub struct PagePipeline {
    recognizer: Arc<dyn TextRecognizer>,
    config: Arc<OcrConfig>,
}

impl PagePipeline {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: Arc<OcrConfig>) -> Self {
        Self { recognizer, config }
    }

    /// Process every page of `document`, calling `on_event` once with
    /// [`PipelineEvent::Started`] and then once per appended page.
    ///
    /// Returns [`RunOutcome::Completed`] when every page was attempted,
    /// [`RunOutcome::Cancelled`] with the finished prefix when `cancel` was
    /// seen, or [`RunOutcome::Failed`] when a render failure aborted the run.
    pub fn run<F>(
        &self,
        document: &dyn DocumentHandle,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> RunOutcome
    where
        F: FnMut(PipelineEvent),
    {
        let total_pages = document.page_count();
        let mut state = RunState::new(total_pages, &self.config);
        info!("Starting OCR of {} pages at {} DPI", total_pages, self.config.dpi);
        on_event(PipelineEvent::Started { total_pages });

        for page_index in 0..total_pages {
            if cancel.is_requested() {
                info!(
                    "Cancellation requested; stopping before page {}/{}",
                    page_index + 1,
                    total_pages
                );
                state.cancelled = true;
                break;
            }

            let start = Instant::now();
            let result = match document.render_page(page_index, self.config.dpi) {
                Ok(raster) => self.recognize(page_index, raster, start),
                Err(e) => {
                    let error = e.into_page_error(page_index);
                    warn!("{}", error);
                    if self.config.failure_policy == FailurePolicy::Abort {
                        let aborted = OcrError::PageAborted {
                            page: page_index + 1,
                            detail: error.to_string(),
                        };
                        return state.into_failed(aborted);
                    }
                    PageResult::failed(page_index, error, elapsed_ms(start))
                }
            };

            let progress = PageProgress {
                page_index,
                total_pages,
                outcome: PageOutcome::of(&result),
            };
            state.append(result);
            on_event(PipelineEvent::Page(progress));
        }

        state.into_outcome()
    }

    /// Recognise one rendered page. The raster is dropped before returning.
    fn recognize(&self, page_index: usize, raster: RasterImage, start: Instant) -> PageResult {
        let recognized = self.recognizer.recognize(&raster, &self.config.languages);
        drop(raster);

        match recognized {
            Ok(text) => {
                debug!(
                    "Page {}: {} chars in {}ms",
                    page_index + 1,
                    text.chars().count(),
                    elapsed_ms(start)
                );
                PageResult::recognized(page_index, text, elapsed_ms(start))
            }
            Err(e) => {
                let error = e.into_page_error(page_index);
                warn!("{}", error);
                PageResult::failed(page_index, error, elapsed_ms(start))
            }
        }
    }
}

/// Mutable record of one execution, owned by the pipeline thread.
struct RunState {
    current_page_index: usize,
    total_pages: usize,
    accumulator: ResultAccumulator,
    cancelled: bool,
}

impl RunState {
    fn new(total_pages: usize, config: &OcrConfig) -> Self {
        Self {
            current_page_index: 0,
            total_pages,
            accumulator: ResultAccumulator::with_capacity(
                config.page_separator.clone(),
                total_pages,
            ),
            cancelled: false,
        }
    }

    fn append(&mut self, result: PageResult) {
        self.accumulator.append(result);
        self.current_page_index += 1;
        debug_assert_eq!(self.accumulator.len(), self.current_page_index);
    }

    fn into_outcome(self) -> RunOutcome {
        info!(
            "OCR {}: {}/{} pages",
            if self.cancelled { "cancelled" } else { "complete" },
            self.current_page_index,
            self.total_pages
        );
        let document = self.accumulator.into_document();
        if self.cancelled {
            RunOutcome::Cancelled(document)
        } else {
            RunOutcome::Completed(document)
        }
    }

    fn into_failed(self, error: OcrError) -> RunOutcome {
        warn!(
            "OCR aborted after {}/{} pages: {}",
            self.current_page_index, self.total_pages, error
        );
        RunOutcome::Failed {
            error: Arc::new(error),
            partial: Some(self.accumulator.into_document()),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
