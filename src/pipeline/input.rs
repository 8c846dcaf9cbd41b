//! Input resolution: a user-supplied path or URL → bytes + a display name.
//!
//! Both document sources open from memory, so downloads never touch disk.
//! The format is sniffed from magic bytes before anything is parsed, so a
//! wrong file type yields [`ScribeError::UnsupportedFormat`] instead of a
//! parser error.

use crate::error::ScribeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document bytes and a name to report them under.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// File name (local) or last URL path segment (download).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Container formats the pipeline can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Pptx,
    /// Legacy binary presentation; converted to `Pptx` before opening.
    LegacyPpt,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => f.write_str("pdf"),
            DocumentFormat::Pptx => f.write_str("pptx"),
            DocumentFormat::LegacyPpt => f.write_str("ppt"),
        }
    }
}

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to document bytes.
///
/// If the input is a URL, download it. If it is a local file, validate it
/// exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ScribeError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

async fn resolve_local(path_str: &str) -> Result<ResolvedInput, ScribeError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ScribeError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ScribeError::PermissionDenied { path });
        }
        Err(_) => return Err(ScribeError::FileNotFound { path }),
    };

    debug!("Resolved local document: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        name: file_name(&path),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ScribeError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScribeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_error = |e: reqwest::Error| {
        if e.is_timeout() {
            ScribeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ScribeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(ScribeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_error)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput {
        name: filename_from_url(url),
        bytes: bytes.to_vec(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Last non-empty URL path segment that looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}

/// Sniff the container format.
///
/// A zip only counts as a presentation when it has `ppt/` entries; an OLE2
/// compound file, or anything named `.ppt`, is treated as a legacy
/// presentation.
pub fn detect_format(bytes: &[u8], name: &str) -> Result<DocumentFormat, ScribeError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(DocumentFormat::Pdf);
    }

    if bytes.starts_with(ZIP_MAGIC) {
        return if zip_has_ppt_part(bytes) {
            Ok(DocumentFormat::Pptx)
        } else {
            Err(ScribeError::UnsupportedFormat {
                name: name.to_string(),
                detail: "zip archive without a ppt/ part (not a presentation)".into(),
            })
        };
    }

    let is_ppt_name = Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ppt"));
    if bytes.starts_with(OLE2_MAGIC) || is_ppt_name {
        return Ok(DocumentFormat::LegacyPpt);
    }

    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ScribeError::UnsupportedFormat {
        name: name.to_string(),
        detail: format!("unrecognised magic bytes {:02X?}", magic),
    })
}

fn zip_has_ppt_part(bytes: &[u8]) -> bool {
    match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive.file_names().any(|n| n.starts_with("ppt/")),
        Err(_) => false,
    }
}

/// Read one zip entry fully. Shared by the presentation source.
pub(crate) fn read_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| format!("{}: {}", name, e))?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| format!("{}: {}", name, e))?;
    Ok(buf)
}
