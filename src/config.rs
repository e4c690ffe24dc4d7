//! Configuration types for page-by-page OCR runs.
//!
//! Everything a run needs to know (resolution, language hints, what to do
//! with a page that will not render, how pages are separated in the output)
//! lives in [`OcrConfig`], built via [`OcrConfigBuilder`]. The struct is
//! cheap to clone and shared with the background run through an `Arc`.
//!
//! Settings that only matter to the vision recogniser live apart in
//! [`VisionConfig`] so a tesseract-only caller never sees them.

use crate::error::OcrError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one OCR run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2txt::{FailurePolicy, OcrConfig};
///
/// let config = OcrConfig::builder()
///     .dpi(200)
///     .languages(["en-US"])
///     .failure_policy(FailurePolicy::Abort)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Rendering DPI. Range: 72–600. Default: 300.
    ///
    /// Recognisers read small print reliably from 300 DPI upwards; lower it
    /// for large-format pages where memory matters more than fine detail.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 5000.
    ///
    /// A 300-DPI render of an A0 poster would otherwise allocate a
    /// 10 000 × 14 000 px bitmap.
    pub max_rendered_pixels: u32,

    /// Ordered locale tags handed to the recogniser, most likely language first.
    /// Default: `["ko-KR", "en-US"]`.
    pub languages: Vec<String>,

    /// What to do when a page cannot be rasterised. Default: [`FailurePolicy::Continue`].
    pub failure_policy: FailurePolicy,

    /// Header placed before each page's text. Default: [`PageSeparator::Header`].
    pub page_separator: PageSeparator,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 5000,
            languages: vec!["ko-KR".to_string(), "en-US".to_string()],
            failure_policy: FailurePolicy::default(),
            page_separator: PageSeparator::default(),
            password: None,
            download_timeout_secs: 120,
        }
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn languages<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.languages = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(OcrError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.languages.iter().all(|l| l.trim().is_empty()) {
            return Err(OcrError::InvalidConfig(
                "At least one recognition language is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the pipeline reacts to a page that cannot be rasterised.
///
/// Recognition failures are not governed by this policy: they are always
/// recorded as a diagnostic placeholder and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record a placeholder section for the page and move on. (default)
    #[default]
    Continue,
    /// Stop the run with [`OcrError::PageAborted`], keeping pages done so far.
    Abort,
}

/// How each page's section is introduced in the assembled text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// `--- Page N ---` on its own line before every page. (default)
    #[default]
    Header,
    /// A `---` rule between pages, no page numbers.
    HorizontalRule,
    /// Pages joined by a blank line only.
    None,
    /// Custom header; `{page}` is replaced with the 1-indexed page number.
    Custom(String),
}

impl PageSeparator {
    /// Render the heading line placed above page `page_num` (1-indexed).
    ///
    /// Returns `None` when the variant puts nothing in front of this page.
    pub fn heading(&self, page_num: usize) -> Option<String> {
        match self {
            PageSeparator::Header => Some(format!("--- Page {page_num} ---")),
            PageSeparator::HorizontalRule if page_num > 1 => Some("---".to_string()),
            PageSeparator::HorizontalRule | PageSeparator::None => None,
            PageSeparator::Custom(s) => Some(s.replace("{page}", &page_num.to_string())),
        }
    }
}

/// Settings for [`crate::pipeline::recognize::VisionRecognizer`].
#[derive(Clone)]
pub struct VisionConfig {
    /// Model identifier, e.g. "gpt-4.1-nano". If None, uses "gpt-4.1-nano".
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 — transcription, not composition.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts per page on a failed call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::OCR_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}
