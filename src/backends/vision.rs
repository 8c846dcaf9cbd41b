//! Vision-model image descriptions through an `edgequake_llm` provider.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`)
//! spreads the retries out: with 500 ms base and 2 retries the waits are
//! 500 ms → 1 s. An exhausted account quota is not transient and is
//! returned at once.

use crate::capability::ImageDescriber;
use crate::config::ExtractionConfig;
use crate::error::{DescriptionError, ScribeError};
use crate::pipeline::encode::encode_image;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default vision model when none is configured.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Describes images with a multimodal chat model.
#[derive(Clone)]
pub struct VisionDescriber {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl VisionDescriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ScribeError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn call_once(&self, messages: &[ChatMessage]) -> Result<String, DescriptionError> {
        match timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(messages, Some(&self.options)),
        )
        .await
        {
            Err(_) => Err(DescriptionError::Timeout {
                secs: self.timeout_secs,
            }),
            Ok(Err(e)) => Err(classify_provider_error(&e.to_string())),
            Ok(Ok(response)) => {
                debug!(
                    "Description: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
        }
    }
}

#[async_trait]
impl ImageDescriber for VisionDescriber {
    async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, DescriptionError> {
        let start = Instant::now();
        let image_data =
            encode_image(image).map_err(|e| DescriptionError::MalformedImage(e.to_string()))?;
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];

        let mut last_err = DescriptionError::Backend("no attempt made".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Description retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.call_once(&messages).await {
                Ok(content) => {
                    debug!("Described image in {:?}", start.elapsed());
                    return Ok(content);
                }
                Err(e @ DescriptionError::QuotaExhausted(_)) => return Err(e),
                Err(e) => {
                    warn!("Description attempt {} failed: {}", attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Account-level quota errors are final; everything else may be retried.
fn classify_provider_error(message: &str) -> DescriptionError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient_quota") || lower.contains("quota exceeded") {
        DescriptionError::QuotaExhausted(message.to_string())
    } else {
        DescriptionError::Backend(message.to_string())
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ScribeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScribeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    checked before auto-detection so the model choice is honoured even when
///    several API keys are present.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ScribeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

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

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScribeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
