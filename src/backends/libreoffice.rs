//! Legacy `.ppt` → `.pptx` conversion with headless LibreOffice.

use crate::capability::FormatConverter;
use crate::error::ScribeError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

/// Shells out to `soffice --headless --convert-to pptx`.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    command: String,
}

impl LibreOfficeConverter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for LibreOfficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

#[async_trait]
impl FormatConverter for LibreOfficeConverter {
    async fn convert(&self, legacy: Vec<u8>) -> Result<Vec<u8>, ScribeError> {
        let dir = tempfile::tempdir().map_err(|e| ScribeError::ConversionFailed {
            detail: format!("temp dir: {}", e),
        })?;
        let input = dir.path().join("input.ppt");
        let output = dir.path().join("input.pptx");

        tokio::fs::write(&input, &legacy)
            .await
            .map_err(|e| ScribeError::ConversionFailed {
                detail: format!("writing {}: {}", input.display(), e),
            })?;

        info!("Converting legacy presentation ({} bytes)", legacy.len());
        let status = Command::new(&self.command)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pptx")
            .arg("--outdir")
            .arg(dir.path())
            .arg(&input)
            .output()
            .await
            .map_err(|e| ScribeError::ConversionFailed {
                detail: format!("could not run {}: {}", self.command, e),
            })?;

        if !status.status.success() {
            return Err(ScribeError::ConversionFailed {
                detail: format!(
                    "{} exited with {}: {}",
                    self.command,
                    status.status,
                    String::from_utf8_lossy(&status.stderr).trim()
                ),
            });
        }

        tokio::fs::read(&output)
            .await
            .map_err(|e| ScribeError::ConversionFailed {
                detail: format!("no converted output at {}: {}", output.display(), e),
            })
    }
}
