//! Document ingestion entry points.
//!
//! Everything fatal happens here, before the scheduler starts: resolving the
//! input, recognising its format, converting legacy presentations, opening
//! the container and wiring up the enrichment backends. Once a
//! [`Document`] exists, the run always completes with a full
//! [`AggregateResult`].

use crate::backends::{LibreOfficeConverter, TesseractRecognizer, VisionDescriber};
use crate::capability::{DocumentSource, FormatConverter, ImageDescriber, TextRecognizer};
use crate::config::ExtractionConfig;
use crate::document::{Document, UnitKind};
use crate::error::ScribeError;
use crate::output::{AggregateResult, RunStats};
use crate::pipeline::enrich::EnrichmentOptions;
use crate::pipeline::input::{self, DocumentFormat, ResolvedInput};
use crate::pipeline::scheduler::Pipeline;
use crate::sources::{PdfiumSource, PptxSource};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The result of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    /// File name or URL segment the document was read from.
    pub name: String,
    /// Format as uploaded (a legacy `.ppt` stays `LegacyPpt` here).
    pub format: DocumentFormat,
    pub result: AggregateResult,
}

/// Unit and image counts, gathered without any OCR or vision backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub format: DocumentFormat,
    pub kind: UnitKind,
    pub units: usize,
    pub images: usize,
}

/// Extract (and optionally enrich) a document from a path or URL.
///
/// # Errors
/// Returns `Err(ScribeError)` only when the document cannot be obtained or
/// opened, or the requested backends cannot be configured. Per-unit failures
/// are inside the returned result.
pub async fn ingest(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<IngestOutput, ScribeError> {
    let input_str = input_str.as_ref();
    info!("Starting ingestion: {}", input_str);

    // Fail on a missing API key before downloading anything.
    let pipeline = build_pipeline(config)?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run_resolved(&pipeline, resolved, config).await
}

/// Extract a document already held in memory.
///
/// `name` is used for format detection (a `.ppt` extension) and in messages.
pub async fn ingest_bytes(
    bytes: Vec<u8>,
    name: impl Into<String>,
    config: &ExtractionConfig,
) -> Result<IngestOutput, ScribeError> {
    let pipeline = build_pipeline(config)?;
    let resolved = ResolvedInput {
        name: name.into(),
        bytes,
    };
    run_resolved(&pipeline, resolved, config).await
}

/// Synchronous wrapper around [`ingest`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<IngestOutput, ScribeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScribeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(input_str, config))
}

/// Ingest a document and write the rendered text to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn ingest_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RunStats, ScribeError> {
    let output = ingest(input_str, config).await?;
    let text = output.result.render_text(&config.unit_separator);
    write_atomic(output_path.as_ref(), text.as_bytes()).await?;
    Ok(output.result.stats)
}

/// Count units and images without running any enrichment.
///
/// Does not require an LLM provider or OCR engine. Legacy presentations
/// still need the converter.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentSummary, ScribeError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let name = resolved.name.clone();
    let (format, document) = open_document(resolved, config).await?;
    Ok(DocumentSummary {
        name,
        format,
        kind: document.kind(),
        units: document.len(),
        images: document.image_count(),
    })
}

/// Build the scheduler for `config`, creating default backends for any
/// requested enrichment that has no override.
pub fn build_pipeline(config: &ExtractionConfig) -> Result<Pipeline, ScribeError> {
    let mut builder = Pipeline::builder()
        .options(EnrichmentOptions {
            ocr: config.ocr,
            describe: config.describe,
            language: config.language,
        })
        .concurrency(config.concurrency);

    if config.ocr {
        let recognizer: Arc<dyn TextRecognizer> = match config.recognizer {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(TesseractRecognizer::new(&config.tesseract_cmd)),
        };
        builder = builder.recognizer(recognizer);
    }

    if config.describe {
        builder = builder.describer(describer_for(config)?);
    }

    if let Some(ref prompt) = config.description_prompt {
        builder = builder.prompt(prompt.clone());
    }
    if let Some(ref cb) = config.progress_callback {
        builder = builder.progress_callback(Arc::clone(cb));
    }
    if let Some(ref token) = config.cancel_token {
        builder = builder.cancel_token(token.clone());
    }

    builder.build()
}

/// The configured describer override, or a [`VisionDescriber`] resolved from
/// the config and environment.
pub(crate) fn describer_for(config: &ExtractionConfig) -> Result<Arc<dyn ImageDescriber>, ScribeError> {
    match config.describer {
        Some(ref d) => Ok(Arc::clone(d)),
        None => Ok(Arc::new(VisionDescriber::from_config(config)?)),
    }
}

/// Detect the format, convert legacy presentations, and open the container.
pub async fn open_document(
    resolved: ResolvedInput,
    config: &ExtractionConfig,
) -> Result<(DocumentFormat, Document), ScribeError> {
    let ResolvedInput { name, bytes } = resolved;
    let format = input::detect_format(&bytes, &name)?;
    info!("Opening {} as {}", name, format);

    let document = match format {
        DocumentFormat::Pdf => {
            PdfiumSource::new(&name, config.password.clone())
                .open(bytes)
                .await?
        }
        DocumentFormat::Pptx => PptxSource::new(&name).open(bytes).await?,
        DocumentFormat::LegacyPpt => {
            let converter: Arc<dyn FormatConverter> = match config.converter {
                Some(ref c) => Arc::clone(c),
                None => Arc::new(LibreOfficeConverter::new(&config.soffice_cmd)),
            };
            let modern = converter.convert(bytes).await?;
            PptxSource::new(&name).open(modern).await?
        }
    };

    Ok((format, document))
}

async fn run_resolved(
    pipeline: &Pipeline,
    resolved: ResolvedInput,
    config: &ExtractionConfig,
) -> Result<IngestOutput, ScribeError> {
    let name = resolved.name.clone();
    let (format, document) = open_document(resolved, config).await?;
    info!(
        "{}: {} {}s, {} images",
        name,
        document.len(),
        document.kind(),
        document.image_count()
    );

    let result = pipeline.run(&document, config.initial_budget).await;
    Ok(IngestOutput {
        name,
        format,
        result,
    })
}

/// Write `contents` to `path` through a sibling `.tmp` file and a rename, so
/// readers never see a half-written file. Missing parent directories are
/// created.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ScribeError> {
    let write_err = |e| ScribeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}
