//! Run coordinator: one background OCR run per output target.
//!
//! ## Execution model
//!
//! ```text
//!  caller ── start() ──▶ run task (async)
//!                          ├─ resolve input (download / magic check)
//!                          ├─ spawn_blocking: open document, page loop ──┐
//!                          ├─ write sink                                 │ events
//!                          └─ publish terminal status                    ▼
//!                                                    mpsc ──▶ dispatcher task ──▶ RunObserver
//! ```
//!
//! The page loop runs on a blocking thread because pdfium and the tesseract
//! subprocess both block. Observer callbacks never run on that thread: every
//! event is queued on an unbounded FIFO channel and delivered by a dedicated
//! dispatcher task, in page order, followed by exactly one terminal call.
//!
//! Completed and cancelled runs write their text to the sink. A run aborted
//! by [`FailurePolicy::Abort`](crate::FailurePolicy::Abort) still writes the
//! pages finished before the failing one; setup failures write nothing.
//!
//! The latest [`RunSnapshot`] is published through a `watch` channel after
//! every page, so [`RunHandle::snapshot`] never blocks and never waits for
//! the observer.

use crate::cancel::CancellationToken;
use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::output::{RunOutcome, RunSnapshot, RunStatus};
use crate::pipeline::input;
use crate::pipeline::recognize::TextRecognizer;
use crate::pipeline::render::DocumentRenderer;
use crate::pipeline::runner::PagePipeline;
use crate::progress::{PageProgress, PipelineEvent, RunObserver};
use crate::sink::OutputSink;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type ActiveTargets = Arc<Mutex<HashSet<String>>>;

/// Starts and tracks OCR runs.
///
/// # Example
///
/// ```rust,no_run
/// use edgequake_pdf2txt::{
///     Coordinator, FileSink, NoopObserver, OcrConfig, PdfiumRenderer, TesseractRecognizer,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::default();
/// let renderer = Arc::new(PdfiumRenderer::new(config.max_rendered_pixels)?);
/// let recognizer = Arc::new(TesseractRecognizer::new().with_dpi(config.dpi));
/// let coordinator = Coordinator::new(renderer, recognizer, config);
///
/// let run = coordinator.start(
///     "scan.pdf",
///     Arc::new(FileSink::new("output.txt")),
///     Arc::new(NoopObserver),
/// )?;
/// let outcome = run.wait().await;
/// println!("{:?}", outcome.status());
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    renderer: Arc<dyn DocumentRenderer>,
    pipeline: PagePipeline,
    config: Arc<OcrConfig>,
    runtime: Handle,
    active: ActiveTargets,
}

impl Coordinator {
    /// Create a coordinator that spawns runs on the current tokio runtime.
    ///
    /// # Panics
    /// Outside a tokio runtime, like [`Handle::current`].
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        recognizer: Arc<dyn TextRecognizer>,
        config: OcrConfig,
    ) -> Self {
        Self::with_runtime(renderer, recognizer, config, Handle::current())
    }

    pub fn with_runtime(
        renderer: Arc<dyn DocumentRenderer>,
        recognizer: Arc<dyn TextRecognizer>,
        config: OcrConfig,
        runtime: Handle,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            renderer,
            pipeline: PagePipeline::new(recognizer, Arc::clone(&config)),
            config,
            runtime,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Whether a run writing to `target` is still live.
    pub fn is_busy(&self, target: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target)
    }

    /// Start a background run over `document` (a local path or URL).
    ///
    /// Returns immediately. Fails with [`OcrError::CoordinatorBusy`] when a
    /// run for the same `sink.target()` has not finished yet; that run is
    /// left untouched.
    pub fn start(
        &self,
        document: impl Into<String>,
        sink: Arc<dyn OutputSink>,
        observer: Arc<dyn RunObserver>,
    ) -> Result<RunHandle, OcrError> {
        let document = document.into();
        let target = sink.target().to_string();
        let guard = TargetGuard::acquire(&self.active, &target)?;
        info!("Starting run: {} → {}", document, target);

        let cancel = CancellationToken::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot::pending());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let dispatcher = self.runtime.spawn(dispatch(events_rx, observer));
        let run = Run {
            document,
            sink,
            renderer: Arc::clone(&self.renderer),
            pipeline: self.pipeline.clone(),
            config: Arc::clone(&self.config),
            cancel: cancel.clone(),
            snapshot: Arc::new(snapshot_tx),
            events: events_tx,
        };
        let task = self.runtime.spawn(run.execute(guard, dispatcher));

        Ok(RunHandle {
            target,
            cancel,
            snapshot: snapshot_rx,
            task,
        })
    }

    /// Request cancellation of `run`. Same as [`RunHandle::cancel`].
    pub fn cancel(&self, run: &RunHandle) {
        run.cancel();
    }
}

/// Caller-side handle to a live or finished run.
#[derive(Debug)]
pub struct RunHandle {
    target: String,
    cancel: CancellationToken,
    snapshot: watch::Receiver<RunSnapshot>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Ask the run to stop before its next page. Idempotent; a no-op once
    /// the run has finished.
    pub fn cancel(&self) {
        debug!("Cancellation requested for {}", self.target);
        self.cancel.request();
    }

    /// A clone of the run's token, e.g. for a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest published progress and status.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end. Resolves after the observer has received
    /// its terminal notification.
    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Run task for {} did not finish: {}", self.target, e);
                RunOutcome::failed(OcrError::Internal(format!("run task failed: {e}")))
            }
        }
    }
}

// ── Active target registry ───────────────────────────────────────────────

/// Holds `target` in the active set until dropped, including on panic.
struct TargetGuard {
    active: ActiveTargets,
    target: String,
}

impl TargetGuard {
    fn acquire(active: &ActiveTargets, target: &str) -> Result<Self, OcrError> {
        let mut set = active.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(target.to_string()) {
            warn!("Rejected run: {} is busy", target);
            return Err(OcrError::CoordinatorBusy {
                target: target.to_string(),
            });
        }
        Ok(Self {
            active: Arc::clone(active),
            target: target.to_string(),
        })
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.target);
    }
}

// ── Background run ───────────────────────────────────────────────────────

enum Notification {
    Started(usize),
    Progress(PageProgress),
    Finished(RunOutcome),
}

struct Run {
    document: String,
    sink: Arc<dyn OutputSink>,
    renderer: Arc<dyn DocumentRenderer>,
    pipeline: PagePipeline,
    config: Arc<OcrConfig>,
    cancel: CancellationToken,
    snapshot: Arc<watch::Sender<RunSnapshot>>,
    events: mpsc::UnboundedSender<Notification>,
}

impl Run {
    async fn execute(self, guard: TargetGuard, dispatcher: JoinHandle<()>) -> RunOutcome {
        let outcome = self.process().await;

        // Publish the terminal status once; the snapshot never leaves it.
        let status = outcome.status();
        self.snapshot.send_modify(|s| {
            if let Some(doc) = outcome.document() {
                s.pages_done = doc.page_count();
            }
            s.status = status.clone();
        });
        match &status {
            RunStatus::Failed(reason) => warn!("Run for {} failed: {}", guard.target, reason),
            other => info!("Run for {} finished: {:?}", guard.target, other),
        }

        drop(guard);
        let _ = self.events.send(Notification::Finished(outcome.clone()));
        drop(self.events);
        if let Err(e) = dispatcher.await {
            error!("Observer dispatcher stopped abnormally: {}", e);
        }
        outcome
    }

    async fn process(&self) -> RunOutcome {
        let resolved =
            match input::resolve_input(&self.document, self.config.download_timeout_secs).await {
                Ok(r) => r,
                Err(e) => return RunOutcome::failed(e),
            };
        let name = resolved.name();

        let outcome = self.run_pages(resolved.path().to_path_buf()).await;
        // The downloaded copy, if any, is only removed here.
        drop(resolved);

        match outcome {
            RunOutcome::Completed(doc) => match self.write_output(&name, &doc.text).await {
                Ok(()) => RunOutcome::Completed(doc),
                Err(e) => RunOutcome::Failed {
                    error: Arc::new(e),
                    partial: Some(doc),
                },
            },
            RunOutcome::Cancelled(doc) => match self.write_output(&name, &doc.text).await {
                Ok(()) => RunOutcome::Cancelled(doc),
                Err(e) => RunOutcome::Failed {
                    error: Arc::new(e),
                    partial: Some(doc),
                },
            },
            RunOutcome::Failed {
                error,
                partial: Some(doc),
            } if matches!(*error, OcrError::PageAborted { .. }) => {
                // The pages finished before the abort are still kept.
                if let Err(e) = self.write_output(&name, &doc.text).await {
                    warn!("Partial output of aborted run not written: {}", e);
                }
                RunOutcome::Failed {
                    error,
                    partial: Some(doc),
                }
            }
            failed @ RunOutcome::Failed { .. } => failed,
        }
    }

    async fn run_pages(&self, path: PathBuf) -> RunOutcome {
        let renderer = Arc::clone(&self.renderer);
        let pipeline = self.pipeline.clone();
        let password = self.config.password.clone();
        let cancel = self.cancel.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let events = self.events.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let document = match renderer.open(&path, password.as_deref()) {
                Ok(d) => d,
                Err(e) => return RunOutcome::failed(e),
            };
            pipeline.run(document.as_ref(), &cancel, |event| {
                match event {
                    PipelineEvent::Started { total_pages } => {
                        snapshot.send_modify(|s| s.total_pages = total_pages);
                        let _ = events.send(Notification::Started(total_pages));
                    }
                    PipelineEvent::Page(progress) => {
                        snapshot.send_modify(|s| s.pages_done = progress.page_index + 1);
                        let _ = events.send(Notification::Progress(progress));
                    }
                }
            })
        })
        .await;

        joined.unwrap_or_else(|e| {
            RunOutcome::failed(OcrError::Internal(format!("page loop panicked: {e}")))
        })
    }

    async fn write_output(&self, name: &str, text: &str) -> Result<(), OcrError> {
        let sink = Arc::clone(&self.sink);
        let name = name.to_string();
        let text = text.to_string();
        let written = tokio::task::spawn_blocking(move || sink.write(&name, &text))
            .await
            .map_err(|e| OcrError::Internal(format!("sink write panicked: {e}")))?;
        written.map_err(|source| OcrError::OutputWriteFailed {
            path: PathBuf::from(self.sink.target()),
            source,
        })
    }
}

async fn dispatch(
    mut events: mpsc::UnboundedReceiver<Notification>,
    observer: Arc<dyn RunObserver>,
) {
    while let Some(notification) = events.recv().await {
        match notification {
            Notification::Started(total_pages) => observer.on_run_start(total_pages),
            Notification::Progress(p) => {
                observer.on_progress(p.page_index, p.total_pages, &p.outcome)
            }
            Notification::Finished(outcome) => {
                match &outcome {
                    RunOutcome::Completed(doc) => observer.on_completed(&doc.text),
                    RunOutcome::Cancelled(doc) => observer.on_cancelled(&doc.text),
                    RunOutcome::Failed { error, .. } => observer.on_failed(error),
                }
                // Nothing may follow the terminal call.
                break;
            }
        }
    }
}
