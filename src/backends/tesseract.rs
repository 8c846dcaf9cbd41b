//! OCR through the `tesseract` command-line tool.

use crate::capability::TextRecognizer;
use crate::error::RecognitionError;
use async_trait::async_trait;
use std::io::Write;
use tokio::process::Command;
use tracing::debug;

/// Runs `tesseract <image> stdout -l <code>` once per image.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: String,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &[u8], language_code: &str) -> Result<String, RecognitionError> {
        // Tesseract reads from a path; the temp file is removed on drop.
        let mut file = tempfile::Builder::new()
            .prefix("scribeme-ocr-")
            .tempfile()
            .map_err(|e| RecognitionError::Backend(format!("temp file: {}", e)))?;
        file.write_all(image)
            .and_then(|_| file.flush())
            .map_err(|e| RecognitionError::Backend(format!("temp file: {}", e)))?;

        let output = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(language_code)
            .output()
            .await
            .map_err(|e| {
                RecognitionError::Backend(format!("could not run {}: {}", self.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, output.status.code()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR ({}): {} chars", language_code, text.len());
        Ok(text)
    }
}

/// Leptonica reports images it cannot decode with a `pixRead` error.
fn classify_failure(stderr: &str, code: Option<i32>) -> RecognitionError {
    let detail = match stderr.trim() {
        "" => format!("exit status {:?}", code),
        s => s.lines().last().unwrap_or(s).to_string(),
    };
    if stderr.contains("pixRead") || stderr.contains("Unsupported image type") {
        RecognitionError::UnreadableImage(detail)
    } else {
        RecognitionError::Backend(detail)
    }
}
