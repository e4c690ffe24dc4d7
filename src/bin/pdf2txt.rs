//! CLI binary for edgequake-pdf2txt.
//!
//! A thin shim over the library crate: maps CLI flags to `OcrConfig`,
//! renders progress with indicatif, and turns Ctrl-C into a cancellation
//! request for the running job.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2txt::{
    inspect, Coordinator, DocumentText, FailurePolicy, FileSink, NoopObserver, OcrConfig,
    OcrError, PageOutcome, PageSeparator, PdfiumRenderer, RunObserver, RunOutcome,
    TesseractRecognizer, TextRecognizer, VisionConfig, VisionRecognizer,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Exit status of a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress observer using indicatif ────────────────────────────────────────

/// Terminal observer: a live progress bar plus one log line per page.
struct CliObserver {
    bar: ProgressBar,
    /// When the previous page finished; pages run strictly one after another.
    last_page_at: Mutex<Instant>,
    errors: AtomicUsize,
}

impl CliObserver {
    /// Spinner only until `on_run_start` reports the page count.
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            last_page_at: Mutex::new(Instant::now()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    /// Seconds since the previous page finished, resetting the clock.
    fn lap(&self) -> f64 {
        let mut last = self
            .last_page_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let secs = last.elapsed().as_secs_f64();
        *last = Instant::now();
        secs
    }
}

impl RunObserver for CliObserver {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.lap();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting OCR of {total_pages} pages…"))
        ));
    }

    fn on_progress(&self, page_index: usize, total_pages: usize, outcome: &PageOutcome) {
        let secs = self.lap();
        let line = match outcome {
            PageOutcome::Recognized { chars } => format!(
                "  {} Page {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                page_index + 1,
                total_pages,
                dim(&format!("{chars:>5} chars")),
                dim(&format!("{secs:.1}s")),
            ),
            PageOutcome::Failed(error) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                let msg = error.to_string();
                let msg = if msg.chars().count() > 80 {
                    format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
                } else {
                    msg
                };
                format!(
                    "  {} Page {:>3}/{:<3}  {}  {}",
                    red("✗"),
                    page_index + 1,
                    total_pages,
                    red(&msg),
                    dim(&format!("{secs:.1}s")),
                )
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_completed(&self, _text: &str) {
        let total = self.bar.length().unwrap_or(0) as usize;
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} pages recognised", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages recognised  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&total.saturating_sub(failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }

    fn on_cancelled(&self, _partial_text: &str) {
        let done = self.bar.position();
        self.bar.abandon();
        eprintln!(
            "{} Cancelled after {} pages; partial text kept",
            yellow("■"),
            bold(&done.to_string())
        );
    }

    fn on_failed(&self, _error: &OcrError) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Korean + English scan, tesseract, text to output.txt
  pdf2txt scan.pdf

  # Choose the output file and languages
  pdf2txt scan.pdf -o scan.txt --lang en-US,de-DE

  # Use a vision model instead of tesseract
  pdf2txt --engine vision --model gpt-4.1-nano scan.pdf

  # Convert from URL
  pdf2txt https://example.org/report.pdf -o report.txt

  # Stop at the first page that cannot be rendered
  pdf2txt --abort-on-render-error scan.pdf

  # Inspect PDF metadata (no OCR engine needed)
  pdf2txt --inspect-only scan.pdf

Press Ctrl-C during a run to stop after the current page. The pages done so
far are still written to the output file and the exit status is 130.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (vision engine)
  ANTHROPIC_API_KEY       Anthropic API key (vision engine)
  GEMINI_API_KEY          Google Gemini API key (vision engine)
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter

SETUP:
  tesseract engine:  install tesseract with the traineddata for each language
                     (e.g. tesseract-ocr-kor, tesseract-ocr-eng)
  pdfium:            place libpdfium next to the working directory or install
                     it system-wide
"#;

/// Extract text from PDF files and URLs with OCR, page by page.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2txt",
    version,
    about = "Extract text from PDF files and URLs with OCR, page by page",
    long_about = "Rasterise every page of a PDF (local file or URL) and run a text recogniser \
over it: the tesseract CLI or a vision language model (OpenAI, Anthropic, Gemini, Ollama, …). \
Progress is reported per page and Ctrl-C stops the run between pages.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the extracted text to this file.
    #[arg(short, long, env = "PDF2TXT_OUTPUT", default_value = "output.txt")]
    output: PathBuf,

    /// Recognition engine.
    #[arg(long, env = "PDF2TXT_ENGINE", value_enum, default_value = "tesseract")]
    engine: EngineArg,

    /// Expected languages as locale tags, most likely first.
    #[arg(
        long = "lang",
        env = "PDF2TXT_LANG",
        value_delimiter = ',',
        default_value = "ko-KR,en-US"
    )]
    languages: Vec<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2TXT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Stop the run when a page cannot be rendered, instead of recording a
    /// diagnostic line for it. Pages done before it are still written.
    #[arg(long, env = "PDF2TXT_ABORT_ON_RENDER_ERROR")]
    abort_on_render_error: bool,

    /// Page separator: header, hr, none, or a custom string ("{page}" is replaced).
    #[arg(long, env = "PDF2TXT_SEPARATOR", default_value = "header")]
    separator: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TXT_PASSWORD")]
    password: Option<String>,

    /// Path to the tesseract binary.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Retries per page when the vision model call fails.
    #[arg(long, env = "PDF2TXT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2TXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print PDF metadata only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Print structured JSON (per-page results, or metadata with --inspect-only) to stdout.
    #[arg(long, env = "PDF2TXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EngineArg {
    Tesseract,
    Vision,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Engines ──────────────────────────────────────────────────────────
    let renderer = Arc::new(
        PdfiumRenderer::new(config.max_rendered_pixels).context("Failed to load pdfium")?,
    );
    let recognizer = build_recognizer(&cli, &config)?;
    let coordinator = Coordinator::new(renderer, recognizer, config);

    let observer: Arc<dyn RunObserver> = if show_progress {
        CliObserver::new()
    } else {
        Arc::new(NoopObserver)
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let run = coordinator
        .start(cli.input.clone(), Arc::new(FileSink::new(&cli.output)), observer)
        .context("Failed to start OCR run")?;

    let token = run.cancellation_token();
    let quiet = cli.quiet;
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if !quiet {
                eprintln!("{}", yellow("Ctrl-C: stopping after the current page…"));
            }
            token.request();
        }
    });

    let outcome = run.wait().await;
    ctrl_c.abort();
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        RunOutcome::Completed(doc) => {
            report(&cli, &doc, show_progress, elapsed_ms)?;
            Ok(())
        }
        RunOutcome::Cancelled(doc) => {
            report(&cli, &doc, show_progress, elapsed_ms)?;
            std::process::exit(EXIT_CANCELLED);
        }
        RunOutcome::Failed { error, partial } => {
            if let Some(doc) = partial {
                if matches!(*error, OcrError::PageAborted { .. }) {
                    eprintln!(
                        "{} {} pages done before the failure were written to {}",
                        red("✘"),
                        doc.page_count(),
                        cli.output.display()
                    );
                } else {
                    eprintln!(
                        "{} {} pages were done but could not be written",
                        red("✘"),
                        doc.page_count()
                    );
                }
            }
            Err(error).context("OCR failed")
        }
    }
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli) -> Result<OcrConfig> {
    let policy = if cli.abort_on_render_error {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    };

    let mut builder = OcrConfig::builder()
        .dpi(cli.dpi)
        .languages(cli.languages.iter().map(|l| l.trim().to_string()))
        .failure_policy(policy)
        .page_separator(parse_separator(&cli.separator))
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }

    builder.build().context("Invalid configuration")
}

fn build_recognizer(cli: &Cli, config: &OcrConfig) -> Result<Arc<dyn TextRecognizer>> {
    match cli.engine {
        EngineArg::Tesseract => Ok(Arc::new(
            TesseractRecognizer::new()
                .with_binary(&cli.tesseract)
                .with_dpi(config.dpi),
        )),
        EngineArg::Vision => {
            let vision = VisionConfig {
                model: cli.model.clone(),
                provider_name: cli.provider.clone(),
                max_retries: cli.max_retries,
                ..Default::default()
            };
            let recognizer =
                VisionRecognizer::new(vision).context("Failed to configure vision model")?;
            Ok(Arc::new(recognizer))
        }
    }
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "header" => PageSeparator::Header,
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

/// Print the JSON result or the summary line once the output file is written.
fn report(cli: &Cli, doc: &DocumentText, show_progress: bool, elapsed_ms: u128) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(doc).context("Failed to serialise output")?;
        println!("{json}");
    }
    if cli.quiet {
        return Ok(());
    }

    // The observer already printed the per-page log and its own tick.
    if !show_progress {
        eprintln!(
            "Recognised {} pages in {}ms",
            doc.page_count() - doc.failed_pages(),
            elapsed_ms
        );
        if doc.failed_pages() > 0 {
            eprintln!("  {} pages failed", doc.failed_pages());
        }
    }
    eprintln!(
        "   {} chars  →  {}",
        dim(&doc.text.chars().count().to_string()),
        bold(&cli.output.display().to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_names() {
        assert_eq!(parse_separator("header"), PageSeparator::Header);
        assert_eq!(parse_separator("HR"), PageSeparator::HorizontalRule);
        assert_eq!(parse_separator("none"), PageSeparator::None);
        assert_eq!(
            parse_separator("[p.{page}]"),
            PageSeparator::Custom("[p.{page}]".into())
        );
    }

    #[test]
    fn defaults_follow_library_defaults() {
        let cli = Cli::parse_from(["pdf2txt", "scan.pdf"]);
        assert_eq!(cli.output, PathBuf::from("output.txt"));
        assert_eq!(cli.engine, EngineArg::Tesseract);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.languages, vec!["ko-KR", "en-US"]);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn flags_map_to_config() {
        let cli = Cli::parse_from([
            "pdf2txt",
            "--lang",
            "en-US, de-DE",
            "--dpi",
            "150",
            "--abort-on-render-error",
            "--separator",
            "none",
            "scan.pdf",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.languages, vec!["en-US", "de-DE"]);
        assert_eq!(config.dpi, 150);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.page_separator, PageSeparator::None);
    }
}
