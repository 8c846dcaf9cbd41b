//! # scribeme
//!
//! Extract text and images from PDFs and slide decks, optionally enriching
//! the images with OCR and vision-model descriptions under a shared budget.
//!
//! ## Why a budget?
//!
//! A single deck can embed hundreds of images, and each description is a
//! paid API call. Every run gets one [`EnrichmentBudget`] shared by all
//! workers; once it is spent, the remaining images are still extracted but
//! not described. OCR is local and does not draw from it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / PPTX / PPT
//!  │
//!  ├─ 1. Input     resolve local file or download from URL, sniff format
//!  ├─ 2. Convert   legacy .ppt → .pptx via LibreOffice
//!  ├─ 3. Open      pdfium pages or pptx slides, materialised in memory
//!  ├─ 4. Schedule  bounded worker pool, one task per unit
//!  ├─ 5. Extract   text runs + embedded images per unit
//!  ├─ 6. Enrich    OCR per image, description while the budget lasts
//!  └─ 7. Output    units reassembled in order + total enrichment count
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scribeme::{ingest, ExtractionConfig, Language};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .describe(true)
//!         .initial_budget(10)
//!         .language(Language::Spanish)
//!         .build()?;
//!     let output = ingest("slides.pptx", &config).await?;
//!     println!("{}", output.result.render_text(&config.unit_separator));
//!     eprintln!("described {} images", output.result.total_enrichment_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Describing loose images
//!
//! [`describe_images`] runs the same budgeted describer over image files or
//! URLs that are not part of a document, returning one entry per input.
//!
//! ## Plugging in your own backends
//!
//! OCR, descriptions, legacy conversion and document opening all sit behind
//! the traits in [`capability`]. Pass your own implementations through
//! [`ExtractionConfig`], or drive a [`Pipeline`] directly with a
//! [`Document`] you built yourself.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scribeme` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backends;
pub mod capability;
pub mod config;
pub mod describe;
pub mod document;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sources;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{DocumentSource, FormatConverter, ImageDescriber, TextRecognizer};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, Language, UnitSeparator};
pub use describe::{describe_images, DescriptionStatus, ImageDescription};
pub use document::{Document, DocumentUnit, ImageBytes, MemoryUnit, UnitKind};
pub use error::{
    DescriptionError, ExtractionError, ExtractionStage, RecognitionError, ScribeError, UnitError,
};
pub use ingest::{
    build_pipeline, ingest, ingest_bytes, ingest_sync, ingest_to_file, inspect, write_atomic,
    DocumentSummary, IngestOutput,
};
pub use output::{AggregateResult, EnrichedImage, ImageOutcome, RunStats, UnitResult};
pub use pipeline::budget::EnrichmentBudget;
pub use pipeline::enrich::EnrichmentOptions;
pub use pipeline::input::DocumentFormat;
pub use pipeline::scheduler::{Pipeline, PipelineBuilder};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
