//! Standalone image descriptions, outside of any document.
//!
//! The same budget, prompt selection and describer as the document pipeline,
//! applied to a list of image files or URLs. Results keep the input order.

use crate::config::ExtractionConfig;
use crate::error::ScribeError;
use crate::ingest::describer_for;
use crate::pipeline::budget::EnrichmentBudget;
use crate::pipeline::enrich::{DescriptionOutcome, Enricher, EnrichmentOptions};
use crate::pipeline::input::{self, ResolvedInput};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// The description of one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescription {
    /// File name, or last URL segment, the image was read from.
    pub filename: String,
    #[serde(flatten)]
    pub status: DescriptionStatus,
}

/// What happened to one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DescriptionStatus {
    Described { description: String },
    /// The budget ran out before this image. Not an error.
    Skipped,
    /// A budget unit was spent and the call failed.
    Failed { error: String },
}

impl ImageDescription {
    pub fn description(&self) -> Option<&str> {
        match &self.status {
            DescriptionStatus::Described { description } => Some(description),
            _ => None,
        }
    }
}

impl fmt::Display for ImageDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            DescriptionStatus::Described { description } => {
                write!(f, "{}: {}", self.filename, description)
            }
            DescriptionStatus::Skipped => {
                write!(f, "{}: [skipped, description budget exhausted]", self.filename)
            }
            DescriptionStatus::Failed { error } => {
                write!(f, "{}: [error] {}", self.filename, error)
            }
        }
    }
}

/// Describe every image in `inputs` (paths or URLs) in `config.language`.
///
/// Reading an input is fatal, like opening a document. Description failures
/// are reported per image. At most `config.initial_budget` calls are made.
pub async fn describe_images(
    inputs: &[impl AsRef<str>],
    config: &ExtractionConfig,
) -> Result<Vec<ImageDescription>, ScribeError> {
    if inputs.is_empty() {
        return Err(ScribeError::InvalidConfig(
            "At least one image is required".into(),
        ));
    }

    let enricher = Enricher::new(
        EnrichmentOptions {
            ocr: false,
            describe: true,
            language: config.language,
        },
        None,
        Some(describer_for(config)?),
        config.description_prompt.clone(),
    )?;

    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        resolved.push(input::resolve_input(input.as_ref(), config.download_timeout_secs).await?);
    }

    Ok(describe_resolved(&enricher, resolved, config).await)
}

async fn describe_resolved(
    enricher: &Enricher,
    images: Vec<ResolvedInput>,
    config: &ExtractionConfig,
) -> Vec<ImageDescription> {
    let budget = EnrichmentBudget::new(config.initial_budget);
    info!(
        "Describing {} images, budget {}",
        images.len(),
        config.initial_budget
    );

    let described: Vec<ImageDescription> = stream::iter(images)
        .map(|ResolvedInput { name, bytes }| {
            let budget = &budget;
            async move {
                let status = match enricher.enrich(&bytes, budget).await.description {
                    DescriptionOutcome::Described(description) => {
                        DescriptionStatus::Described { description }
                    }
                    DescriptionOutcome::Failed(e) => DescriptionStatus::Failed {
                        error: e.to_string(),
                    },
                    DescriptionOutcome::Skipped | DescriptionOutcome::NotRequested => {
                        DescriptionStatus::Skipped
                    }
                };
                ImageDescription {
                    filename: name,
                    status,
                }
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    info!("Described {} images", budget.spent());
    described
}
