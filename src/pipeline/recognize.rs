//! Recognition adapter: raster image in, text out.
//!
//! [`TextRecognizer`] is synchronous on purpose. The page loop runs on a
//! blocking thread (pdfium requires it), so a recogniser may block for as long
//! as its engine needs; the pipeline only checks for cancellation between
//! pages.
//!
//! Two engines ship with the crate:
//!
//! * [`TesseractRecognizer`] — the `tesseract` command-line tool. Local,
//!   free, needs the matching traineddata for each language.
//! * [`VisionRecognizer`] — a vision-language model reached through
//!   `edgequake-llm` (OpenAI, Anthropic, Gemini, Ollama, …), with retry and
//!   exponential backoff per page.

use super::encode::{encode_image_data, encode_png};
use super::postprocess::clean_text;
use super::render::RasterImage;
use crate::config::VisionConfig;
use crate::error::{OcrError, RecognitionError};
use crate::prompts::{language_hint, OCR_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Turns a rendered page into text.
pub trait TextRecognizer: Send + Sync {
    /// Recognise `image`. `languages` are locale tags, most likely first.
    fn recognize(&self, image: &RasterImage, languages: &[String])
        -> Result<String, RecognitionError>;
}

// ── tesseract ────────────────────────────────────────────────────────────

/// [`TextRecognizer`] that shells out to the `tesseract` CLI.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    dpi: Option<u32>,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            dpi: None,
        }
    }
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a tesseract binary other than the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Tell tesseract the resolution the page was rendered at.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        image: &RasterImage,
        languages: &[String],
    ) -> Result<String, RecognitionError> {
        let start = Instant::now();
        let png = encode_png(image).map_err(|e| RecognitionError::Encoding(e.to_string()))?;

        // Removed with the directory when `tmpdir` drops, success or not.
        let tmpdir = tempfile::TempDir::with_prefix("pdf2txt").map_err(|e| {
            RecognitionError::Unavailable {
                engine: "tesseract".into(),
                detail: format!("cannot create temp dir: {e}"),
            }
        })?;
        let input_path = tmpdir
            .path()
            .join(format!("page_{:03}.png", image.page_index + 1));
        std::fs::write(&input_path, &png).map_err(|e| RecognitionError::Unavailable {
            engine: "tesseract".into(),
            detail: format!("cannot write input image: {e}"),
        })?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&input_path).arg("stdout");
        let codes = tesseract_languages(languages);
        if !codes.is_empty() {
            cmd.arg("-l").arg(codes.join("+"));
        }
        if let Some(dpi) = self.dpi {
            cmd.arg("--dpi").arg(dpi.to_string());
        }

        let output = cmd.output().map_err(|e| RecognitionError::Unavailable {
            engine: "tesseract".into(),
            detail: format!("cannot run {}: {e}", self.binary.display()),
        })?;
        if !output.status.success() {
            return Err(RecognitionError::EngineFailed {
                engine: "tesseract".into(),
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = clean_text(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "Page {}: tesseract produced {} chars in {:?}",
            image.page_index + 1,
            text.chars().count(),
            start.elapsed()
        );
        Ok(text)
    }
}

/// Map locale tags to tesseract traineddata names, keeping order, dropping
/// duplicates and tags with no known model.
pub fn tesseract_languages(tags: &[String]) -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = Vec::with_capacity(tags.len());
    for tag in tags {
        match tesseract_code(tag) {
            Some(code) if !codes.contains(&code) => codes.push(code),
            Some(_) => {}
            None => warn!("No tesseract model known for language tag '{}'", tag),
        }
    }
    codes
}

fn tesseract_code(tag: &str) -> Option<&'static str> {
    let tag = tag.trim().replace('_', "-").to_lowercase();
    let mut parts = tag.split('-');
    let primary = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    let code = match primary {
        "zh" => {
            if rest
                .iter()
                .any(|p| matches!(*p, "tw" | "hk" | "mo" | "hant"))
            {
                "chi_tra"
            } else {
                "chi_sim"
            }
        }
        "en" => "eng",
        "ko" => "kor",
        "ja" => "jpn",
        "fr" => "fra",
        "de" => "deu",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "uk" => "ukr",
        "pl" => "pol",
        "nl" => "nld",
        "sv" => "swe",
        "tr" => "tur",
        "ar" => "ara",
        "he" => "heb",
        "hi" => "hin",
        "th" => "tha",
        "vi" => "vie",
        "id" => "ind",
        "el" => "ell",
        "cs" => "ces",
        _ => return None,
    };
    Some(code)
}

// ── vision model ─────────────────────────────────────────────────────────

/// [`TextRecognizer`] backed by a vision-language model.
///
/// Calls are async underneath; `recognize` blocks on them through the runtime
/// handle captured at construction, so it must be called from a blocking
/// thread (as the pipeline does), never from inside an async task.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    config: VisionConfig,
    runtime: Handle,
}

impl VisionRecognizer {
    /// Resolve the provider and capture the current runtime.
    ///
    /// # Panics
    /// Outside a tokio runtime, like [`Handle::current`].
    pub fn new(config: VisionConfig) -> Result<Self, OcrError> {
        Self::with_runtime(config, Handle::current())
    }

    pub fn with_runtime(config: VisionConfig, runtime: Handle) -> Result<Self, OcrError> {
        let provider = resolve_provider(&config)?;
        Ok(Self {
            provider,
            config,
            runtime,
        })
    }

    async fn transcribe(
        &self,
        page_num: usize,
        image_data: ImageData,
        languages: &[String],
    ) -> Result<String, RecognitionError> {
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(OCR_SYSTEM_PROMPT);
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images(&language_hint(languages), vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.config.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num,
                    attempt,
                    self.config.max_retries,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page_num, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(clean_text(&response.content));
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!(
                        "Page {}: attempt {} failed — {}",
                        page_num,
                        attempt + 1,
                        err_msg
                    );
                    last_err = Some(err_msg);
                }
            }
        }

        Err(RecognitionError::EngineFailed {
            engine: "vision model".into(),
            detail: format!(
                "{} retries exhausted: {}",
                self.config.max_retries,
                last_err.unwrap_or_else(|| "unknown error".to_string())
            ),
        })
    }
}

impl TextRecognizer for VisionRecognizer {
    fn recognize(
        &self,
        image: &RasterImage,
        languages: &[String],
    ) -> Result<String, RecognitionError> {
        let data =
            encode_image_data(image).map_err(|e| RecognitionError::Encoding(e.to_string()))?;
        self.runtime
            .block_on(self.transcribe(image.page_index + 1, data, languages))
    }
}

/// Upper bound for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`, capped
/// at [`MAX_BACKOFF`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// Resolve the provider, from most-specific to least-specific:
/// pre-built provider, named provider, `EDGEQUAKE_LLM_PROVIDER` +
/// `EDGEQUAKE_MODEL`, `OPENAI_API_KEY`, then full auto-detection.
fn resolve_provider(config: &VisionConfig) -> Result<Arc<dyn LLMProvider>, OcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrError::InvalidConfig(format!(
            "No vision provider could be auto-detected from environment.\n\
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
             Error: {}",
            e
        )))?;
    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, OcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        OcrError::InvalidConfig(format!(
            "Vision provider '{provider_name}' is not configured: {e}"
        ))
    })
}
