//! Unit processor: extraction followed by per-image enrichment.

use crate::document::{DocumentUnit, UnitKind};
use crate::error::UnitError;
use crate::output::{EnrichedImage, ImageOutcome, UnitResult};
use crate::pipeline::budget::EnrichmentBudget;
use crate::pipeline::enrich::{DescriptionOutcome, Enricher};
use crate::pipeline::extract::extract;
use tracing::{debug, warn};

/// Process one page or slide.
///
/// Images are visited in their original order. OCR text is appended to the
/// unit's text; descriptions fill `enriched_images` in the same order. Every
/// collaborator failure becomes a [`UnitError`] on the result.
pub async fn process_unit(
    unit: &dyn DocumentUnit,
    kind: UnitKind,
    enricher: &Enricher,
    budget: &EnrichmentBudget,
) -> UnitResult {
    let index = unit.index();
    let extraction = extract(unit);

    let mut result = UnitResult {
        index,
        text: extraction.text,
        image_count: extraction.images.len(),
        enriched_images: Vec::new(),
        enrichment_count: 0,
        errors: extraction
            .errors
            .into_iter()
            .map(|e| UnitError::from_extraction(index, e))
            .collect(),
    };

    if !enricher.is_active() {
        return result;
    }

    let describe_only = enricher.options().describe && !enricher.options().ocr;

    for (position, image) in extraction.images.iter().enumerate() {
        let image_no = position + 1;

        // Nothing left to do for the rest of this unit once the budget is
        // visibly gone and OCR is off.
        if describe_only && budget.peek() == 0 {
            debug!(
                "{} {}: budget exhausted, {} images left undescribed",
                kind.title(),
                index,
                extraction.images.len() - position
            );
            break;
        }

        let outcome = enricher.enrich(image, budget).await;

        match outcome.ocr_text.as_ref() {
            Some(Ok(text)) if !text.is_empty() => {
                if !result.text.is_empty() {
                    result.text.push_str("\n\n");
                }
                result.text.push_str(&format!(
                    "OCR text from image {} on {} {}: {}",
                    image_no, kind, index, text
                ));
            }
            Some(Err(e)) => {
                warn!("{} {}, image {}: OCR failed: {}", kind.title(), index, image_no, e);
                result.errors.push(UnitError::Recognition {
                    unit: index,
                    image: image_no,
                    detail: e.to_string(),
                });
            }
            _ => {}
        }

        if outcome.spent_budget() {
            result.enrichment_count += 1;
        }

        match outcome.description {
            DescriptionOutcome::Described(description) => {
                result.enriched_images.push(EnrichedImage {
                    image: image_no,
                    outcome: ImageOutcome::Described { description },
                });
            }
            DescriptionOutcome::Failed(e) => {
                warn!(
                    "{} {}, image {}: description failed: {}",
                    kind.title(),
                    index,
                    image_no,
                    e
                );
                result.enriched_images.push(EnrichedImage {
                    image: image_no,
                    outcome: ImageOutcome::Failed {
                        error: UnitError::Description {
                            unit: index,
                            image: image_no,
                            detail: e.to_string(),
                        },
                    },
                });
            }
            DescriptionOutcome::NotRequested | DescriptionOutcome::Skipped => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ImageDescriber, TextRecognizer};
    use crate::config::Language;
    use crate::document::{ImageBytes, MemoryUnit};
    use crate::error::{DescriptionError, ExtractionError, RecognitionError};
    use crate::pipeline::enrich::EnrichmentOptions;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Describes each image as its own bytes, failing for `b"bad"`.
    #[derive(Default)]
    struct EchoDescriber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageDescriber for EchoDescriber {
        async fn describe(&self, image: &[u8], _prompt: &str) -> Result<String, DescriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if image == b"bad" {
                return Err(DescriptionError::Backend("model refused".into()));
            }
            Ok(String::from_utf8_lossy(image).into_owned())
        }
    }

    struct EchoRecognizer;

    #[async_trait]
    impl TextRecognizer for EchoRecognizer {
        async fn recognize(&self, image: &[u8], _code: &str) -> Result<String, RecognitionError> {
            if image == b"bad" {
                return Err(RecognitionError::UnreadableImage("not an image".into()));
            }
            Ok(format!("text in {}", String::from_utf8_lossy(image)))
        }
    }

    fn images(names: &[&str]) -> Vec<ImageBytes> {
        names.iter().map(|n| Arc::from(n.as_bytes())).collect()
    }

    fn describe_only(describer: Arc<EchoDescriber>) -> Enricher {
        Enricher::new(
            EnrichmentOptions {
                ocr: false,
                describe: true,
                language: Language::English,
            },
            None,
            Some(describer),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn zero_images_yields_empty_slots() {
        let unit = MemoryUnit::new(1, vec!["Only text".into()], vec![]);
        let enricher = describe_only(Arc::new(EchoDescriber::default()));
        let budget = EnrichmentBudget::new(5);

        let result = process_unit(&unit, UnitKind::Page, &enricher, &budget).await;
        assert_eq!(result.text, "Only text");
        assert_eq!(result.image_count, 0);
        assert!(result.enriched_images.is_empty());
        assert_eq!(result.enrichment_count, 0);
        assert!(!result.has_errors());
    }

    #[tokio::test]
    async fn descriptions_keep_image_order() {
        let unit = MemoryUnit::new(2, vec![], images(&["first", "second", "third"]));
        let enricher = describe_only(Arc::new(EchoDescriber::default()));
        let budget = EnrichmentBudget::new(10);

        let result = process_unit(&unit, UnitKind::Slide, &enricher, &budget).await;
        let described: Vec<&str> = result
            .enriched_images
            .iter()
            .filter_map(|slot| slot.description())
            .collect();
        assert_eq!(described, vec!["first", "second", "third"]);
        assert_eq!(result.enrichment_count, 3);
        assert_eq!(budget.peek(), 7);
    }

    #[tokio::test]
    async fn stops_describing_when_budget_runs_out() {
        let describer = Arc::new(EchoDescriber::default());
        let unit = MemoryUnit::new(1, vec![], images(&["a", "b", "c", "d"]));
        let enricher = describe_only(describer.clone());
        let budget = EnrichmentBudget::new(2);

        let result = process_unit(&unit, UnitKind::Page, &enricher, &budget).await;
        assert_eq!(result.enrichment_count, 2);
        assert_eq!(result.image_count, 4);
        assert_eq!(result.enriched_images.len(), 2);
        assert_eq!(describer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_description_keeps_text_and_marks_slot() {
        let unit = MemoryUnit::new(1, vec!["Slide 1".into()], images(&["bad"]));
        let enricher = describe_only(Arc::new(EchoDescriber::default()));
        let budget = EnrichmentBudget::new(5);

        let result = process_unit(&unit, UnitKind::Slide, &enricher, &budget).await;
        assert_eq!(result.text, "Slide 1");
        assert_eq!(result.enriched_images.len(), 1);
        assert!(result.enriched_images[0].is_failed());
        assert_eq!(result.enrichment_count, 1);
        assert!(matches!(
            result.first_error(),
            Some(UnitError::Description { unit: 1, image: 1, .. })
        ));
    }

    #[tokio::test]
    async fn ocr_text_is_appended_and_failures_recorded() {
        let unit = MemoryUnit::new(3, vec!["Heading".into()], images(&["scan", "bad"]));
        let enricher = Enricher::new(
            EnrichmentOptions {
                ocr: true,
                describe: false,
                language: Language::Arabic,
            },
            Some(Arc::new(EchoRecognizer)),
            None,
            None,
        )
        .unwrap();
        let budget = EnrichmentBudget::new(0);

        let result = process_unit(&unit, UnitKind::Page, &enricher, &budget).await;
        assert_eq!(
            result.text,
            "Heading\n\nOCR text from image 1 on page 3: text in scan"
        );
        assert_eq!(result.enrichment_count, 0);
        assert_eq!(
            result.errors,
            vec![UnitError::Recognition {
                unit: 3,
                image: 2,
                detail: "unreadable image: not an image".into(),
            }]
        );
    }

    #[tokio::test]
    async fn extraction_failure_is_recorded_not_fatal() {
        let unit = MemoryUnit::from_parts(
            4,
            Err(ExtractionError::text("bad stream")),
            Ok(images(&["pic"])),
        );
        let enricher = describe_only(Arc::new(EchoDescriber::default()));
        let budget = EnrichmentBudget::new(1);

        let result = process_unit(&unit, UnitKind::Page, &enricher, &budget).await;
        assert_eq!(result.enrichment_count, 1);
        assert_eq!(result.enriched_images[0].description(), Some("pic"));
        assert!(matches!(
            result.errors.as_slice(),
            [UnitError::Extraction { unit: 4, .. }]
        ));
    }
}
