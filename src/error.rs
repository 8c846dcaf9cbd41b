//! Error types for the scribeme library.
//!
//! Two layers of failure, mirroring the two layers of work:
//!
//! * [`ScribeError`]: **Fatal**: the document could not be obtained or opened
//!   at all (missing file, unsupported format, conversion failure, provider not
//!   configured). Returned as `Err(ScribeError)` from the top-level `ingest*`
//!   functions.
//!
//! * [`UnitError`]: **Non-fatal**: one page or slide, or one image inside it,
//!   failed. Stored inside [`crate::output::UnitResult`] so the rest of the
//!   document is still returned.
//!
//! The collaborator errors ([`ExtractionError`], [`RecognitionError`],
//! [`DescriptionError`]) are what the pluggable capabilities return; the
//! pipeline converts them into [`UnitError`] markers attached to the smallest
//! result they affect. Running out of enrichment budget is not an error at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scribeme library.
#[derive(Debug, Error)]
pub enum ScribeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a (legacy) presentation.
    #[error("Unsupported document '{name}': {detail}")]
    UnsupportedFormat { name: String, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The container is corrupt and cannot be enumerated.
    #[error("Document '{name}' is corrupt: {detail}")]
    CorruptDocument { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Legacy `.ppt` → `.pptx` conversion failed.
    #[error("Legacy presentation conversion failed: {detail}\nIs LibreOffice installed? Set --soffice to its path.")]
    ConversionFailed { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Enrichment backends ───────────────────────────────────────────────
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which half of a unit's extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStage {
    Text,
    Images,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStage::Text => f.write_str("text"),
            ExtractionStage::Images => f.write_str("image"),
        }
    }
}

/// A document unit could not yield its text or its images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} extraction failed: {detail}")]
pub struct ExtractionError {
    pub stage: ExtractionStage,
    pub detail: String,
}

impl ExtractionError {
    pub fn text(detail: impl Into<String>) -> Self {
        Self {
            stage: ExtractionStage::Text,
            detail: detail.into(),
        }
    }

    pub fn images(detail: impl Into<String>) -> Self {
        Self {
            stage: ExtractionStage::Images,
            detail: detail.into(),
        }
    }
}

/// OCR failed for one image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The backend could not decode the image.
    #[error("unreadable image: {0}")]
    UnreadableImage(String),

    /// The OCR engine itself failed (not installed, crashed, missing language data).
    #[error("OCR backend failed: {0}")]
    Backend(String),
}

/// The vision-description call failed for one image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptionError {
    /// The image could not be decoded or re-encoded for upload.
    #[error("malformed image: {0}")]
    MalformedImage(String),

    /// The provider refused the call because its own quota is exhausted.
    #[error("upstream quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The call did not finish within the configured timeout.
    #[error("description call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Any other provider failure, after retries.
    #[error("description backend failed: {0}")]
    Backend(String),
}

/// A non-fatal error attached to a single unit (page or slide).
///
/// Units are 1-indexed; image positions are 1-indexed within their unit.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitError {
    /// Text or image extraction failed; the other half may still be present.
    #[error("Unit {unit}: {stage} extraction failed: {detail}")]
    Extraction {
        unit: usize,
        stage: ExtractionStage,
        detail: String,
    },

    /// OCR failed for one image.
    #[error("Unit {unit}, image {image}: OCR failed: {detail}")]
    Recognition {
        unit: usize,
        image: usize,
        detail: String,
    },

    /// The description call failed for one image (a budget unit was spent).
    #[error("Unit {unit}, image {image}: description failed: {detail}")]
    Description {
        unit: usize,
        image: usize,
        detail: String,
    },

    /// The unit's task died unexpectedly.
    #[error("Unit {unit}: processing task failed: {detail}")]
    Panicked { unit: usize, detail: String },

    /// The run was cancelled before this unit started.
    #[error("Unit {unit}: cancelled before processing started")]
    Cancelled { unit: usize },
}

impl UnitError {
    /// The unit this error belongs to.
    pub fn unit(&self) -> usize {
        match self {
            UnitError::Extraction { unit, .. }
            | UnitError::Recognition { unit, .. }
            | UnitError::Description { unit, .. }
            | UnitError::Panicked { unit, .. }
            | UnitError::Cancelled { unit } => *unit,
        }
    }

    pub(crate) fn from_extraction(unit: usize, err: ExtractionError) -> Self {
        UnitError::Extraction {
            unit,
            stage: err.stage,
            detail: err.detail,
        }
    }
}
