//! In-memory document model handed to the extraction pipeline.
//!
//! A [`Document`] is an ordered list of units (pages or slides). Sources open
//! the container up front and materialise every unit before the pipeline
//! starts, so the pipeline itself never touches the file format.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Raw bytes of one embedded image. Cheap to clone.
pub type ImageBytes = Arc<[u8]>;

/// What a unit is, which only matters for labelling output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A PDF page.
    #[default]
    Page,
    /// A presentation slide.
    Slide,
}

impl UnitKind {
    /// Capitalised label used as a unit heading ("Page", "Slide").
    pub fn title(self) -> &'static str {
        match self {
            UnitKind::Page => "Page",
            UnitKind::Slide => "Slide",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Page => f.write_str("page"),
            UnitKind::Slide => f.write_str("slide"),
        }
    }
}

/// One page or slide, as exposed by a document source.
///
/// Text and images are separate accessors so that a failure in one never
/// hides the other. Implementations must be pure: calling either method twice
/// returns the same data.
pub trait DocumentUnit: Send + Sync {
    /// 1-based position of the unit in its document.
    fn index(&self) -> usize;

    /// Text fragments in the order they were found, not reflowed.
    fn text_runs(&self) -> Result<Vec<String>, ExtractionError>;

    /// Embedded raster images in the order they were encountered.
    fn images(&self) -> Result<Vec<ImageBytes>, ExtractionError>;

    /// Images that could not be read while the rest of the unit's images
    /// were. Their siblings are still returned by [`DocumentUnit::images`].
    fn image_errors(&self) -> Vec<ExtractionError> {
        Vec::new()
    }
}

/// A fully materialised unit. Errors hit while reading the container are kept
/// per half so extraction can report them without losing the other half.
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    index: usize,
    text_runs: Result<Vec<String>, ExtractionError>,
    images: Result<Vec<ImageBytes>, ExtractionError>,
    image_errors: Vec<ExtractionError>,
}

impl MemoryUnit {
    pub fn new(index: usize, text_runs: Vec<String>, images: Vec<ImageBytes>) -> Self {
        Self {
            index,
            text_runs: Ok(text_runs),
            images: Ok(images),
            image_errors: Vec::new(),
        }
    }

    /// Build a unit from the outcome of reading each half separately.
    pub fn from_parts(
        index: usize,
        text_runs: Result<Vec<String>, ExtractionError>,
        images: Result<Vec<ImageBytes>, ExtractionError>,
    ) -> Self {
        Self {
            index,
            text_runs,
            images,
            image_errors: Vec::new(),
        }
    }

    /// Attach failures for individual images whose siblings were kept.
    pub fn with_image_errors(mut self, errors: Vec<ExtractionError>) -> Self {
        self.image_errors = errors;
        self
    }
}

impl DocumentUnit for MemoryUnit {
    fn index(&self) -> usize {
        self.index
    }

    fn text_runs(&self) -> Result<Vec<String>, ExtractionError> {
        self.text_runs.clone()
    }

    fn images(&self) -> Result<Vec<ImageBytes>, ExtractionError> {
        self.images.clone()
    }

    fn image_errors(&self) -> Vec<ExtractionError> {
        self.image_errors.clone()
    }
}

/// An opened document: ordered units of a single kind.
#[derive(Clone)]
pub struct Document {
    kind: UnitKind,
    units: Vec<Arc<dyn DocumentUnit>>,
}

impl Document {
    pub fn new(kind: UnitKind, units: Vec<Arc<dyn DocumentUnit>>) -> Self {
        Self { kind, units }
    }

    /// Convenience constructor for materialised units.
    pub fn from_memory(kind: UnitKind, units: Vec<MemoryUnit>) -> Self {
        let units = units
            .into_iter()
            .map(|u| Arc::new(u) as Arc<dyn DocumentUnit>)
            .collect();
        Self { kind, units }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn units(&self) -> &[Arc<dyn DocumentUnit>] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of images that could be read across all units.
    pub fn image_count(&self) -> usize {
        self.units
            .iter()
            .filter_map(|u| u.images().ok())
            .map(|images| images.len())
            .sum()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .field("units", &self.units.len())
            .finish()
    }
}
