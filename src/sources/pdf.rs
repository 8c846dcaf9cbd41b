//! PDF pages via pdfium: page text plus every embedded raster image.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. Opening and walking
//! the document happens on the blocking pool; only plain bytes and strings
//! cross back to the runtime.

use crate::capability::DocumentSource;
use crate::document::{Document, ImageBytes, MemoryUnit, UnitKind};
use crate::error::{ExtractionError, ScribeError};
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Opens PDFs with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource {
    name: String,
    password: Option<String>,
}

impl PdfiumSource {
    /// `name` is only used in error messages.
    pub fn new(name: impl Into<String>, password: Option<String>) -> Self {
        Self {
            name: name.into(),
            password,
        }
    }
}

#[async_trait]
impl DocumentSource for PdfiumSource {
    async fn open(&self, bytes: Vec<u8>) -> Result<Document, ScribeError> {
        let name = self.name.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || open_blocking(&bytes, &name, password.as_deref()))
            .await
            .map_err(|e| ScribeError::Internal(format!("PDF open task panicked: {}", e)))?
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library path.
pub(crate) fn bind_pdfium() -> Result<Pdfium, ScribeError> {
    let dir = std::env::var("PDFIUM_LIB_PATH").unwrap_or_else(|_| "./".to_string());
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ScribeError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn open_blocking(
    bytes: &[u8],
    name: &str,
    password: Option<&str>,
) -> Result<Document, ScribeError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| map_load_error(e, name, password.is_some()))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let units = pages
        .iter()
        .enumerate()
        .map(|(i, page)| read_page(i + 1, &page))
        .collect();

    Ok(Document::from_memory(UnitKind::Page, units))
}

fn map_load_error(err: PdfiumError, name: &str, had_password: bool) -> ScribeError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            ScribeError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            ScribeError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        ScribeError::CorruptDocument {
            name: name.to_string(),
            detail: err_str,
        }
    }
}

/// Text and images are read independently so one failing leaves the other.
fn read_page(index: usize, page: &PdfPage<'_>) -> MemoryUnit {
    let text = page
        .text()
        .map(|t| vec![t.all()])
        .map_err(|e| ExtractionError::text(format!("{:?}", e)));

    let (images, image_errors) = read_page_images(index, page);
    debug!(
        "Page {}: {} images, {} unreadable",
        index,
        images.len(),
        image_errors.len()
    );

    MemoryUnit::from_parts(index, text, Ok(images)).with_image_errors(image_errors)
}

/// Every decodable image object on the page, plus one error per object that
/// could not be read. One bad image does not hide the others on the page.
fn read_page_images(
    index: usize,
    page: &PdfPage<'_>,
) -> (Vec<ImageBytes>, Vec<ExtractionError>) {
    let mut images = Vec::new();
    let mut errors = Vec::new();

    for (position, object) in page.objects().iter().enumerate() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };

        let png = image_object
            .get_raw_image()
            .map_err(|e| format!("{:?}", e))
            .and_then(|raw| encode_png(&raw).map_err(|e| e.to_string()));

        match png {
            Ok(png) => images.push(ImageBytes::from(png)),
            Err(detail) => {
                warn!("Page {}: unreadable image object {}: {}", index, position, detail);
                errors.push(image_object_error(position, &detail));
            }
        }
    }

    (images, errors)
}

fn image_object_error(position: usize, detail: &str) -> ExtractionError {
    ExtractionError::images(format!("image object {}: {}", position, detail))
}
