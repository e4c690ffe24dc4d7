//! Integration tests for the page pipeline and the run coordinator.
//!
//! Everything here runs against in-process fakes for the renderer and the
//! recogniser, so neither the pdfium library nor a tesseract binary is
//! needed.

use edgequake_pdf2txt::{
    CancellationToken, Coordinator, DocumentHandle, DocumentRenderer, FailurePolicy, FileSink,
    MemorySink, OcrConfig, OcrError, OutputSink, PageOutcome, PagePipeline, PageSeparator,
    PipelineEvent, RasterImage, RecognitionError, RenderError, RunObserver, RunOutcome,
    TextRecognizer,
};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Renders blank pages; `broken` pages fail. `open` waits for `opened`.
struct FakeRenderer {
    pages: usize,
    broken: HashSet<usize>,
    opened: Arc<AtomicBool>,
}

impl FakeRenderer {
    fn new(pages: usize) -> Self {
        Self {
            pages,
            broken: HashSet::new(),
            opened: Arc::new(AtomicBool::new(true)),
        }
    }

    fn broken_at(mut self, index: usize) -> Self {
        self.broken.insert(index);
        self
    }

    fn held_open(mut self, opened: Arc<AtomicBool>) -> Self {
        self.opened = opened;
        self
    }
}

struct FakeDocument<'a> {
    renderer: &'a FakeRenderer,
}

impl DocumentRenderer for FakeRenderer {
    fn open<'a>(
        &'a self,
        _path: &Path,
        _password: Option<&'a str>,
    ) -> Result<Box<dyn DocumentHandle + 'a>, OcrError> {
        while !self.opened.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(2));
        }
        Ok(Box::new(FakeDocument { renderer: self }))
    }
}

impl DocumentHandle for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.renderer.pages
    }

    fn render_page(&self, page_index: usize, _dpi: u32) -> Result<RasterImage, RenderError> {
        if self.renderer.broken.contains(&page_index) {
            return Err(RenderError(format!("bad xref for page object {page_index}")));
        }
        Ok(RasterImage::new(page_index, DynamicImage::new_rgb8(4, 4)))
    }
}

/// Returns "line N" for page N, fails `unreadable` pages, and requests
/// cancellation on `cancel_at` once the token is installed.
#[derive(Default)]
struct ScriptedRecognizer {
    unreadable: HashSet<usize>,
    cancel_at: Option<usize>,
    token: Mutex<Option<CancellationToken>>,
    threads: Mutex<HashSet<ThreadId>>,
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(
        &self,
        image: &RasterImage,
        languages: &[String],
    ) -> Result<String, RecognitionError> {
        self.threads
            .lock()
            .unwrap()
            .insert(std::thread::current().id());
        assert_eq!(languages, ["ko-KR", "en-US"]);

        if self.cancel_at == Some(image.page_index) {
            if let Some(token) = self.token.lock().unwrap().as_ref() {
                token.request();
            }
        }
        if self.unreadable.contains(&image.page_index) {
            return Err(RecognitionError::EngineFailed {
                engine: "scripted".into(),
                detail: "nothing legible".into(),
            });
        }
        Ok(format!("line {}", image.page_index + 1))
    }
}

/// Records every callback in order, plus the threads they ran on.
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    threads: Mutex<HashSet<ThreadId>>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.threads
            .lock()
            .unwrap()
            .insert(std::thread::current().id());
        self.log.lock().unwrap().push(entry);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn terminal_calls(&self) -> usize {
        self.log()
            .iter()
            .filter(|e| matches!(e.as_str(), "completed" | "cancelled" | "failed"))
            .count()
    }
}

impl RunObserver for Recorder {
    fn on_run_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }

    fn on_progress(&self, page_index: usize, total_pages: usize, outcome: &PageOutcome) {
        let kind = match outcome {
            PageOutcome::Recognized { .. } => "ok",
            PageOutcome::Failed(_) => "err",
        };
        self.push(format!("{page_index}/{total_pages} {kind}"));
    }

    fn on_completed(&self, _text: &str) {
        self.push("completed".into());
    }

    fn on_cancelled(&self, _partial_text: &str) {
        self.push("cancelled".into());
    }

    fn on_failed(&self, _error: &OcrError) {
        self.push("failed".into());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Route library logs to the test harness. `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pdf_in(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();
    path.to_string_lossy().into_owned()
}

fn output_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("out").join("output.txt")
}

// ── Page pipeline ────────────────────────────────────────────────────────────

#[test]
fn cancel_right_after_third_page_keeps_pages_zero_to_two() {
    let renderer = FakeRenderer::new(5);
    let document = renderer.open(Path::new("unused.pdf"), None).unwrap();
    let pipeline = PagePipeline::new(
        Arc::new(ScriptedRecognizer::default()),
        Arc::new(OcrConfig::default()),
    );
    let token = CancellationToken::new();

    let mut seen = Vec::new();
    let outcome = pipeline.run(document.as_ref(), &token, |event| {
        if let PipelineEvent::Page(p) = event {
            seen.push(p.page_index);
            if p.page_index == 2 {
                token.request();
            }
        }
    });

    assert_eq!(seen, vec![0, 1, 2]);
    let RunOutcome::Cancelled(partial) = outcome else {
        panic!("expected Cancelled, got {outcome:?}");
    };
    assert_eq!(
        partial.text,
        "\n--- Page 1 ---\nline 1\n\n\n--- Page 2 ---\nline 2\n\n\n--- Page 3 ---\nline 3"
    );
}

#[test]
fn custom_separator_is_applied_per_page() {
    let renderer = FakeRenderer::new(2);
    let document = renderer.open(Path::new("unused.pdf"), None).unwrap();
    let config = OcrConfig::builder()
        .page_separator(PageSeparator::Custom("[[{page}]]".into()))
        .build()
        .unwrap();
    let pipeline = PagePipeline::new(Arc::new(ScriptedRecognizer::default()), Arc::new(config));

    let outcome = pipeline.run(document.as_ref(), &CancellationToken::new(), |_| {});
    let doc = outcome.document().unwrap();
    assert_eq!(doc.text, "\n[[1]]\nline 1\n\n\n[[2]]\nline 2");
}

// ── Coordinator ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_run_writes_every_section_to_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let recognizer = Arc::new(ScriptedRecognizer {
        unreadable: [1].into_iter().collect(),
        ..Default::default()
    });
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(3)),
        recognizer,
        OcrConfig::default(),
    );
    let observer = Arc::new(Recorder::default());
    let output = output_in(&dir);

    let run = coordinator
        .start(pdf_in(&dir), Arc::new(FileSink::new(&output)), observer.clone())
        .unwrap();
    let outcome = run.wait().await;

    let RunOutcome::Completed(doc) = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.failed_pages(), 1);
    assert_eq!(
        observer.log(),
        vec!["start 3", "0/3 ok", "1/3 err", "2/3 ok", "completed"]
    );

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, doc.text);
    assert!(written.contains("--- Page 2 ---\n[ERROR] OCR failed: page 2: scripted"));
    assert!(written.ends_with("--- Page 3 ---\nline 3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_run_writes_partial_text() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let opened = Arc::new(AtomicBool::new(false));
    let recognizer = Arc::new(ScriptedRecognizer {
        cancel_at: Some(2),
        ..Default::default()
    });
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(5).held_open(opened.clone())),
        recognizer.clone(),
        OcrConfig::default(),
    );
    let observer = Arc::new(Recorder::default());
    let output = output_in(&dir);

    let run = coordinator
        .start(pdf_in(&dir), Arc::new(FileSink::new(&output)), observer.clone())
        .unwrap();
    *recognizer.token.lock().unwrap() = Some(run.cancellation_token());
    opened.store(true, Ordering::SeqCst);
    let outcome = run.wait().await;

    let RunOutcome::Cancelled(partial) = outcome else {
        panic!("expected Cancelled");
    };
    let indices: Vec<usize> = partial.pages.iter().map(|p| p.page_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        observer.log(),
        vec!["start 5", "0/5 ok", "1/5 ok", "2/5 ok", "cancelled"]
    );

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("line 3"));
    assert!(!written.contains("Page 4"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_policy_fails_and_writes_finished_prefix() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = OcrConfig::builder()
        .failure_policy(FailurePolicy::Abort)
        .build()
        .unwrap();
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(4).broken_at(1)),
        Arc::new(ScriptedRecognizer::default()),
        config,
    );
    let observer = Arc::new(Recorder::default());
    let sink = Arc::new(MemorySink::new("mem://abort"));

    let run = coordinator
        .start(pdf_in(&dir), sink.clone(), observer.clone())
        .unwrap();
    let outcome = run.wait().await;

    let RunOutcome::Failed { error, partial } = outcome else {
        panic!("expected Failed");
    };
    assert!(matches!(*error, OcrError::PageAborted { page: 2, .. }));
    let partial = partial.expect("aborted run keeps its prefix");
    assert_eq!(partial.page_count(), 1);
    assert_eq!(observer.log(), vec!["start 4", "0/4 ok", "failed"]);

    assert_eq!(sink.writes().len(), 1);
    let written = sink.contents().unwrap();
    assert_eq!(written, partial.text);
    assert_eq!(written, "\n--- Page 1 ---\nline 1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn render_failure_continues_under_default_policy() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(3).broken_at(0)),
        Arc::new(ScriptedRecognizer::default()),
        OcrConfig::default(),
    );
    let observer = Arc::new(Recorder::default());
    let sink = Arc::new(MemorySink::new("mem://continue"));

    let outcome = coordinator
        .start(pdf_in(&dir), sink.clone(), observer.clone())
        .unwrap()
        .wait()
        .await;

    assert!(matches!(outcome, RunOutcome::Completed(ref d) if d.page_count() == 3));
    assert_eq!(observer.log()[1], "0/3 err");
    let text = sink.contents().unwrap();
    assert!(text.starts_with("\n--- Page 1 ---\n[ERROR] render failed: page 1"));
    assert!(text.contains("line 2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_pdf_input_fails_before_any_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, b"plain text pretending to be a pdf").unwrap();

    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(3)),
        Arc::new(ScriptedRecognizer::default()),
        OcrConfig::default(),
    );
    let observer = Arc::new(Recorder::default());
    let sink = Arc::new(MemorySink::new("mem://nonpdf"));

    let run = coordinator
        .start(path.to_string_lossy(), sink.clone(), observer.clone())
        .unwrap();
    let outcome = run.wait().await;

    let RunOutcome::Failed { error, partial } = outcome else {
        panic!("expected Failed");
    };
    assert!(matches!(*error, OcrError::NotAPdf { .. }));
    assert!(partial.is_none());
    assert_eq!(observer.log(), vec!["failed"]);
    assert!(sink.writes().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn observer_runs_off_the_pipeline_thread_with_one_terminal_call() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = Arc::new(ScriptedRecognizer::default());
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(6)),
        recognizer.clone(),
        OcrConfig::default(),
    );
    let observer = Arc::new(Recorder::default());

    let run = coordinator
        .start(
            pdf_in(&dir),
            Arc::new(MemorySink::new("mem://threads")),
            observer.clone(),
        )
        .unwrap();
    let _ = run.wait().await;

    let pipeline_threads = recognizer.threads.lock().unwrap().clone();
    let observer_threads = observer.threads.lock().unwrap().clone();
    assert_eq!(pipeline_threads.len(), 1);
    assert!(pipeline_threads.is_disjoint(&observer_threads));
    assert_eq!(observer.terminal_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn busy_target_rejected_while_other_targets_run() {
    let dir = tempfile::tempdir().unwrap();
    let opened = Arc::new(AtomicBool::new(false));
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(2).held_open(opened.clone())),
        Arc::new(ScriptedRecognizer::default()),
        OcrConfig::default(),
    );
    let a: Arc<dyn OutputSink> = Arc::new(MemorySink::new("mem://a"));
    let b: Arc<dyn OutputSink> = Arc::new(MemorySink::new("mem://b"));

    let first = coordinator
        .start(pdf_in(&dir), a.clone(), Arc::new(Recorder::default()))
        .unwrap();
    let second = coordinator
        .start(pdf_in(&dir), b, Arc::new(Recorder::default()))
        .unwrap();
    let err = coordinator
        .start(pdf_in(&dir), a, Arc::new(Recorder::default()))
        .unwrap_err();
    assert!(matches!(err, OcrError::CoordinatorBusy { ref target } if target == "mem://a"));

    opened.store(true, Ordering::SeqCst);
    assert!(matches!(first.wait().await, RunOutcome::Completed(_)));
    assert!(matches!(second.wait().await, RunOutcome::Completed(_)));
    assert!(!coordinator.is_busy("mem://a"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_file_under_another_spelling_is_busy() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let opened = Arc::new(AtomicBool::new(false));
    let coordinator = Coordinator::new(
        Arc::new(FakeRenderer::new(2).held_open(opened.clone())),
        Arc::new(ScriptedRecognizer::default()),
        OcrConfig::default(),
    );
    let output = dir.path().join("out.txt");

    let first = coordinator
        .start(
            pdf_in(&dir),
            Arc::new(FileSink::new(&output)),
            Arc::new(Recorder::default()),
        )
        .unwrap();

    for alias in [
        dir.path().join(".").join("out.txt"),
        dir.path().join("elsewhere").join("..").join("out.txt"),
    ] {
        let err = coordinator
            .start(
                pdf_in(&dir),
                Arc::new(FileSink::new(&alias)),
                Arc::new(Recorder::default()),
            )
            .unwrap_err();
        assert!(
            matches!(err, OcrError::CoordinatorBusy { .. }),
            "{} was not treated as busy: {err:?}",
            alias.display()
        );
    }

    opened.store(true, Ordering::SeqCst);
    assert!(matches!(first.wait().await, RunOutcome::Completed(_)));
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "\n--- Page 1 ---\nline 1\n\n\n--- Page 2 ---\nline 2"
    );
}
