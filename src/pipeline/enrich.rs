//! Enrichment coordinator: OCR and vision description for one image.
//!
//! OCR is never budget-gated. Description always asks the shared
//! [`EnrichmentBudget`] first and, when the budget says no, quietly skips.

use crate::capability::{ImageDescriber, TextRecognizer};
use crate::config::Language;
use crate::error::{DescriptionError, RecognitionError, ScribeError};
use crate::pipeline::budget::EnrichmentBudget;
use crate::pipeline::postprocess::{clean_description, clean_text};
use crate::prompts::description_prompt;
use std::sync::Arc;
use tracing::debug;

/// Which enrichments to run, and in which language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentOptions {
    pub ocr: bool,
    pub describe: bool,
    pub language: Language,
}

/// What happened on the description side for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionOutcome {
    /// Description was not requested for this run.
    NotRequested,
    /// Requested, but the budget was exhausted. Not an error.
    Skipped,
    /// A budget unit was spent and the describer answered.
    Described(String),
    /// A budget unit was spent and the describer failed.
    Failed(DescriptionError),
}

/// Everything the coordinator produced for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    /// `None` when OCR was not requested.
    pub ocr_text: Option<Result<String, RecognitionError>>,
    pub description: DescriptionOutcome,
}

impl EnrichmentOutcome {
    /// Whether this image consumed a unit of budget.
    pub fn spent_budget(&self) -> bool {
        matches!(
            self.description,
            DescriptionOutcome::Described(_) | DescriptionOutcome::Failed(_)
        )
    }
}

/// Runs OCR and description for images, sharing one set of backends across
/// every worker in a run.
#[derive(Clone)]
pub struct Enricher {
    options: EnrichmentOptions,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    describer: Option<Arc<dyn ImageDescriber>>,
    prompt: Arc<str>,
}

impl Enricher {
    /// Build a coordinator. Fails if an enrichment is requested without the
    /// backend it needs.
    pub fn new(
        options: EnrichmentOptions,
        recognizer: Option<Arc<dyn TextRecognizer>>,
        describer: Option<Arc<dyn ImageDescriber>>,
        prompt_override: Option<String>,
    ) -> Result<Self, ScribeError> {
        if options.ocr && recognizer.is_none() {
            return Err(ScribeError::InvalidConfig(
                "OCR requested but no text recognizer configured".into(),
            ));
        }
        if options.describe && describer.is_none() {
            return Err(ScribeError::InvalidConfig(
                "description requested but no image describer configured".into(),
            ));
        }

        let prompt: Arc<str> = match prompt_override {
            Some(p) => Arc::from(p),
            None => Arc::from(description_prompt(options.language)),
        };

        Ok(Self {
            options,
            recognizer,
            describer,
            prompt,
        })
    }

    pub fn options(&self) -> &EnrichmentOptions {
        &self.options
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Whether any enrichment is enabled at all.
    pub fn is_active(&self) -> bool {
        self.options.ocr || self.options.describe
    }

    /// Enrich one image.
    ///
    /// Collaborator failures are returned inside the outcome, never as `Err`:
    /// one bad image must not take its unit down with it.
    pub async fn enrich(&self, image: &[u8], budget: &EnrichmentBudget) -> EnrichmentOutcome {
        let ocr_text = match (&self.recognizer, self.options.ocr) {
            (Some(recognizer), true) => Some(
                recognizer
                    .recognize(image, self.options.language.ocr_code())
                    .await
                    .map(|text| clean_text(&text)),
            ),
            _ => None,
        };

        let description = match (&self.describer, self.options.describe) {
            (Some(describer), true) => {
                if budget.try_consume() {
                    match describer.describe(image, &self.prompt).await {
                        Ok(text) => DescriptionOutcome::Described(clean_description(&text)),
                        Err(e) => DescriptionOutcome::Failed(e),
                    }
                } else {
                    debug!("Enrichment budget exhausted, skipping description");
                    DescriptionOutcome::Skipped
                }
            }
            _ => DescriptionOutcome::NotRequested,
        };

        EnrichmentOutcome {
            ocr_text,
            description,
        }
    }
}
