//! Result types produced by the extraction pipeline.
//!
//! [`UnitResult`] is what one worker produces for one page or slide;
//! [`AggregateResult`] is the whole document, always in unit order and always
//! one entry per unit, however the workers finished.

use crate::config::UnitSeparator;
use crate::document::UnitKind;
use crate::error::UnitError;
use serde::{Deserialize, Serialize};

/// What happened to one image that consumed a budget unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// The vision model described the image.
    Described { description: String },
    /// The description call failed; the marker says why.
    Failed { error: UnitError },
}

/// An enrichment slot: one image that was sent for description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedImage {
    /// 1-indexed position of the image within its unit.
    pub image: usize,
    pub outcome: ImageOutcome,
}

impl EnrichedImage {
    pub fn description(&self) -> Option<&str> {
        match &self.outcome {
            ImageOutcome::Described { description } => Some(description),
            ImageOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ImageOutcome::Failed { .. })
    }
}

/// Result for a single page or slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
    /// 1-indexed unit number; output is ordered by this.
    pub index: usize,

    /// Extracted text, with OCR text appended when requested.
    pub text: String,

    /// Number of images found in the unit.
    pub image_count: usize,

    /// Slots for images that consumed budget, in image order.
    pub enriched_images: Vec<EnrichedImage>,

    /// Budget units spent by this unit.
    pub enrichment_count: usize,

    /// Errors contained at unit or image level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<UnitError>,
}

impl UnitResult {
    /// An empty result for a unit that never ran or whose task died.
    pub fn failed(index: usize, error: UnitError) -> Self {
        Self {
            index,
            text: String::new(),
            image_count: 0,
            enriched_images: Vec::new(),
            enrichment_count: 0,
            errors: vec![error],
        }
    }

    /// True if any step of this unit failed, including description slots.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.enriched_images.iter().any(EnrichedImage::is_failed)
    }

    /// The first error marker, for progress reporting.
    pub fn first_error(&self) -> Option<&UnitError> {
        self.errors.first().or_else(|| {
            self.enriched_images.iter().find_map(|slot| match &slot.outcome {
                ImageOutcome::Failed { error } => Some(error),
                ImageOutcome::Described { .. } => None,
            })
        })
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_units: usize,
    pub units_with_errors: usize,
    pub total_images: usize,
    pub failed_descriptions: usize,
    pub cancelled_units: usize,
    /// Budget units actually consumed. Equals `total_enrichment_count` unless
    /// a unit panicked after spending budget, whose count is then lost with
    /// the rest of its result.
    pub budget_spent: usize,
    pub duration_ms: u64,
}

/// The ordered result of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub kind: UnitKind,

    /// One entry per unit, sorted by `index` ascending.
    pub units: Vec<UnitResult>,

    /// Sum of every unit's `enrichment_count`; never above the initial budget.
    pub total_enrichment_count: usize,

    pub stats: RunStats,
}

impl AggregateResult {
    /// Assemble unit results received in any order.
    pub fn assemble(kind: UnitKind, mut units: Vec<UnitResult>, duration_ms: u64) -> Self {
        units.sort_by_key(|u| u.index);

        let total_enrichment_count = units.iter().map(|u| u.enrichment_count).sum();
        let stats = RunStats {
            total_units: units.len(),
            units_with_errors: units.iter().filter(|u| u.has_errors()).count(),
            total_images: units.iter().map(|u| u.image_count).sum(),
            failed_descriptions: units
                .iter()
                .flat_map(|u| u.enriched_images.iter())
                .filter(|slot| slot.is_failed())
                .count(),
            cancelled_units: units
                .iter()
                .filter(|u| u.errors.iter().any(|e| matches!(e, UnitError::Cancelled { .. })))
                .count(),
            budget_spent: total_enrichment_count,
            duration_ms,
        };

        Self {
            kind,
            units,
            total_enrichment_count,
            stats,
        }
    }

    /// All error markers across the run, in unit order.
    pub fn errors(&self) -> impl Iterator<Item = &UnitError> {
        self.units.iter().flat_map(|u| {
            u.errors.iter().chain(u.enriched_images.iter().filter_map(|slot| {
                match &slot.outcome {
                    ImageOutcome::Failed { error } => Some(error),
                    ImageOutcome::Described { .. } => None,
                }
            }))
        })
    }

    /// Render the run as plain text: a heading per unit, its text, then its
    /// image descriptions and error markers.
    pub fn render_text(&self, separator: &UnitSeparator) -> String {
        let mut out = String::new();
        let label = self.kind.to_string();

        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                out.push_str(&separator.render(&label, unit.index));
            }
            out.push_str(&format!("{} {}:\n", self.kind.title(), unit.index));
            if !unit.text.is_empty() {
                out.push_str(&unit.text);
                out.push('\n');
            }
            for slot in &unit.enriched_images {
                match &slot.outcome {
                    ImageOutcome::Described { description } => out.push_str(&format!(
                        "\nImage description on {} {}: {}\n",
                        label, unit.index, description
                    )),
                    ImageOutcome::Failed { error } => {
                        out.push_str(&format!("\n[error] {}\n", error))
                    }
                }
            }
            for error in &unit.errors {
                out.push_str(&format!("\n[error] {}\n", error));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: usize, text: &str, count: usize) -> UnitResult {
        UnitResult {
            index,
            text: text.to_string(),
            image_count: count,
            enriched_images: (1..=count)
                .map(|image| EnrichedImage {
                    image,
                    outcome: ImageOutcome::Described {
                        description: format!("image {image}"),
                    },
                })
                .collect(),
            enrichment_count: count,
            errors: Vec::new(),
        }
    }

    #[test]
    fn assemble_sorts_and_sums() {
        let result = AggregateResult::assemble(
            UnitKind::Page,
            vec![unit(3, "c", 1), unit(1, "a", 2), unit(2, "b", 0)],
            12,
        );
        let order: Vec<usize> = result.units.iter().map(|u| u.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(result.total_enrichment_count, 3);
        assert_eq!(result.stats.total_units, 3);
        assert_eq!(result.stats.total_images, 3);
        assert_eq!(result.stats.units_with_errors, 0);
    }

    #[test]
    fn failed_slot_counts_as_error() {
        let mut u = unit(1, "Slide 1", 0);
        u.image_count = 1;
        u.enrichment_count = 1;
        u.enriched_images.push(EnrichedImage {
            image: 1,
            outcome: ImageOutcome::Failed {
                error: UnitError::Description {
                    unit: 1,
                    image: 1,
                    detail: "HTTP 500".into(),
                },
            },
        });
        assert!(u.has_errors());
        assert!(matches!(u.first_error(), Some(UnitError::Description { .. })));

        let result = AggregateResult::assemble(UnitKind::Slide, vec![u], 0);
        assert_eq!(result.stats.failed_descriptions, 1);
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn render_text_labels_units() {
        let result = AggregateResult::assemble(
            UnitKind::Page,
            vec![unit(1, "Hello", 1), unit(2, "World", 0)],
            0,
        );
        let text = result.render_text(&UnitSeparator::HorizontalRule);
        assert!(text.starts_with("Page 1:\nHello\n"));
        assert!(text.contains("Image description on page 1: image 1"));
        assert!(text.contains("\n\n---\n\nPage 2:\nWorld\n"));
    }

    #[test]
    fn cancelled_units_are_counted() {
        let result = AggregateResult::assemble(
            UnitKind::Page,
            vec![
                unit(1, "x", 0),
                UnitResult::failed(2, UnitError::Cancelled { unit: 2 }),
            ],
            0,
        );
        assert_eq!(result.stats.cancelled_units, 1);
        assert_eq!(result.stats.units_with_errors, 1);
    }

    #[test]
    fn serialises_outcome_with_status_tag() {
        let slot = EnrichedImage {
            image: 2,
            outcome: ImageOutcome::Described {
                description: "a cat".into(),
            },
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["outcome"]["status"], "described");
        assert_eq!(json["outcome"]["description"], "a cat");
    }
}
