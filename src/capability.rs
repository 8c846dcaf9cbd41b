//! Pluggable collaborators the pipeline talks to.
//!
//! The pipeline never parses document formats, runs OCR, or talks to a
//! vision model itself. It reaches those through the traits below, shared as
//! `Arc<dyn …>` across concurrent workers. Default implementations live in
//! [`crate::sources`] and [`crate::backends`]; tests substitute in-memory fakes.

use crate::document::Document;
use crate::error::{DescriptionError, RecognitionError, ScribeError};
use async_trait::async_trait;

/// Opens a document container and materialises its units.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Parse `bytes` into an ordered [`Document`].
    ///
    /// Failing here is fatal for the run; per-unit problems belong inside the
    /// returned units instead.
    async fn open(&self, bytes: Vec<u8>) -> Result<Document, ScribeError>;
}

/// Optical character recognition for a single image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognise the text in `image` using a Tesseract-style language code
    /// (`eng`, `ara`, `spa`).
    async fn recognize(&self, image: &[u8], language_code: &str)
        -> Result<String, RecognitionError>;
}

/// Vision-model description of a single image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe `image` following `prompt`.
    async fn describe(&self, image: &[u8], prompt: &str) -> Result<String, DescriptionError>;
}

/// Converts legacy binary presentations to the modern container format.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    /// Convert `.ppt` bytes to `.pptx` bytes.
    async fn convert(&self, legacy: Vec<u8>) -> Result<Vec<u8>, ScribeError>;
}
