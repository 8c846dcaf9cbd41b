//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct means a config can be shared
//! across threads, logged with `{:?}`, and diffed between runs.

use crate::capability::{FormatConverter, ImageDescriber, TextRecognizer};
use crate::error::ScribeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use scribeme::{ExtractionConfig, Language};
///
/// let config = ExtractionConfig::builder()
///     .describe(true)
///     .initial_budget(10)
///     .language(Language::Spanish)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Number of units processed at the same time. Default: 10.
    ///
    /// This is the only concurrency bound in the pipeline. Each worker holds
    /// one unit for as long as its OCR and description calls take.
    pub concurrency: usize,

    /// How many images may be sent to the vision model in this run. Default: 25.
    ///
    /// Shared by every worker; once spent, remaining images are extracted but
    /// not described.
    pub initial_budget: usize,

    /// Run OCR on every embedded image and fold the text into its unit. Default: false.
    ///
    /// OCR does not draw from the enrichment budget.
    pub ocr: bool,

    /// Describe embedded images with a vision model, up to the budget. Default: false.
    pub describe: bool,

    /// Language for OCR and the description prompt. Default: English.
    pub language: Language,

    /// Vision model identifier, e.g. "gpt-4o". If None, uses `gpt-4o`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom OCR backend. If None and `ocr` is set, Tesseract is used.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Custom description backend. If None and `describe` is set, the vision
    /// provider above is used.
    pub describer: Option<Arc<dyn ImageDescriber>>,

    /// Custom legacy-presentation converter. If None, LibreOffice is used.
    pub converter: Option<Arc<dyn FormatConverter>>,

    /// Overrides the per-language description prompt.
    pub description_prompt: Option<String>,

    /// Sampling temperature for description calls. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per image description. Default: 325.
    ///
    /// Descriptions are meant to be a paragraph, not an essay; a low cap keeps
    /// per-image cost predictable.
    pub max_tokens: usize,

    /// Retry attempts on a failed description call. Default: 2.
    ///
    /// Retries happen inside one budget unit: a retried image still counts once.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-description-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Tesseract executable. Default: "tesseract".
    pub tesseract_cmd: String,

    /// LibreOffice executable used for `.ppt` conversion. Default: "soffice".
    pub soffice_cmd: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Separator between units in rendered text output.
    pub unit_separator: UnitSeparator,

    /// Receives per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels units that have not started yet when triggered.
    pub cancel_token: Option<CancellationToken>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            initial_budget: 25,
            ocr: false,
            describe: false,
            language: Language::default(),
            model: None,
            provider_name: None,
            provider: None,
            recognizer: None,
            describer: None,
            converter: None,
            description_prompt: None,
            temperature: 0.1,
            max_tokens: 325,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            tesseract_cmd: "tesseract".to_string(),
            soffice_cmd: "soffice".to_string(),
            download_timeout_secs: 120,
            unit_separator: UnitSeparator::default(),
            progress_callback: None,
            cancel_token: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("concurrency", &self.concurrency)
            .field("initial_budget", &self.initial_budget)
            .field("ocr", &self.ocr)
            .field("describe", &self.describe)
            .field("language", &self.language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn TextRecognizer>"))
            .field("describer", &self.describer.as_ref().map(|_| "<dyn ImageDescriber>"))
            .field("converter", &self.converter.as_ref().map(|_| "<dyn FormatConverter>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("soffice_cmd", &self.soffice_cmd)
            .field("unit_separator", &self.unit_separator)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt sent with each image description.
    pub fn prompt(&self) -> &str {
        self.description_prompt
            .as_deref()
            .unwrap_or_else(|| crate::prompts::description_prompt(self.language))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn initial_budget(mut self, n: usize) -> Self {
        self.config.initial_budget = n;
        self
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.config.ocr = v;
        self
    }

    pub fn describe(mut self, v: bool) -> Self {
        self.config.describe = v;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.config.describer = Some(describer);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn description_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.description_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn soffice_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.soffice_cmd = cmd.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn unit_separator(mut self, sep: UnitSeparator) -> Self {
        self.config.unit_separator = sep;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.cancel_token = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ScribeError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ScribeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ScribeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.tesseract_cmd.trim().is_empty() || c.soffice_cmd.trim().is_empty() {
            return Err(ScribeError::InvalidConfig(
                "Backend commands must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Language used for OCR and for the description prompt.
///
/// Only three languages have OCR models and prompt templates. Anything else
/// falls back to English rather than failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Arabic,
    Spanish,
}

impl Language {
    /// Parse a language name or ISO code, case-insensitively.
    ///
    /// Unrecognised values return [`Language::English`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" | "eng" => Language::English,
            "arabic" | "ar" | "ara" => Language::Arabic,
            "spanish" | "es" | "spa" => Language::Spanish,
            other => {
                debug!("Unsupported language {:?}, falling back to English", other);
                Language::English
            }
        }
    }

    /// Tesseract language code.
    pub fn ocr_code(self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::Arabic => "ara",
            Language::Spanish => "spa",
        }
    }
}

/// How to separate units in rendered text output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum UnitSeparator {
    /// A blank line. (default)
    #[default]
    Blank,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with the unit number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between units.
    Custom(String),
}

impl UnitSeparator {
    /// Render the separator placed before unit `index`.
    pub fn render(&self, label: &str, index: usize) -> String {
        match self {
            UnitSeparator::Blank => "\n\n".to_string(),
            UnitSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            UnitSeparator::Comment => format!("\n\n<!-- {} {} -->\n\n", label, index),
            UnitSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.concurrency, 10);
        assert_eq!(c.initial_budget, 25);
        assert!(!c.ocr);
        assert!(!c.describe);
        assert_eq!(c.language, Language::English);
        assert_eq!(c.max_tokens, 325);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ExtractionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_backend_command() {
        let err = ExtractionConfig::builder()
            .tesseract_cmd("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ScribeError::InvalidConfig(_)));
    }

    #[test]
    fn language_parse_accepts_names_and_codes() {
        assert_eq!(Language::parse("Arabic"), Language::Arabic);
        assert_eq!(Language::parse("es"), Language::Spanish);
        assert_eq!(Language::parse("ENGLISH"), Language::English);
    }

    #[test]
    fn unsupported_language_falls_back_to_english() {
        let lang = Language::parse("French");
        assert_eq!(lang, Language::English);
        assert_eq!(lang.ocr_code(), "eng");
    }

    #[test]
    fn prompt_override_wins() {
        let c = ExtractionConfig::builder()
            .language(Language::Arabic)
            .description_prompt("List every object.")
            .build()
            .unwrap();
        assert_eq!(c.prompt(), "List every object.");

        let c = ExtractionConfig::builder()
            .language(Language::Spanish)
            .build()
            .unwrap();
        assert_eq!(c.prompt(), crate::prompts::SPANISH_PROMPT);
    }

    #[test]
    fn separator_render() {
        assert_eq!(UnitSeparator::Blank.render("slide", 2), "\n\n");
        assert_eq!(
            UnitSeparator::Comment.render("slide", 2),
            "\n\n<!-- slide 2 -->\n\n"
        );
    }
}
