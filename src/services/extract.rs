//! Text extraction from uploaded document files.
//!
//! ARCHITECTURE
//! ============
//! Extraction shells out to external tools: `tesseract` for raster images
//! and `pdftotext` for PDFs. Both write plain text to stdout. The trait
//! seam lets tests and alternative deployments substitute an extractor
//! without spawning processes.
//!
//! Files with any other extension yield empty text, so every field check
//! on them fails and the document lands in review.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::ExtractConfig;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: String, status: String, stderr: String },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
}

impl crate::error::ErrorCode for ExtractError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "E_EXTRACT_SPAWN",
            Self::Failed { .. } => "E_EXTRACT_FAILED",
            Self::Timeout { .. } => "E_EXTRACT_TIMEOUT",
        }
    }
}

/// How a file's text is obtained, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMethod {
    Ocr,
    Pdf,
    Unsupported,
}

impl ExtractMethod {
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "png") => Self::Ocr,
            Some("pdf") => Self::Pdf,
            _ => Self::Unsupported,
        }
    }
}

#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractError`] if the underlying tool cannot run,
    /// fails, or exceeds its time budget.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

// =============================================================================
// COMMAND EXTRACTOR
// =============================================================================

pub struct CommandExtractor {
    tesseract_cmd: String,
    pdftotext_cmd: String,
    timeout: Duration,
}

impl CommandExtractor {
    #[must_use]
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            tesseract_cmd: config.tesseract_cmd.clone(),
            pdftotext_cmd: config.pdftotext_cmd.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Program and arguments for `method`, or `None` when unsupported.
    fn command_for(&self, method: ExtractMethod, path: &Path) -> Option<(String, Vec<String>)> {
        let file = path.to_string_lossy().into_owned();
        match method {
            ExtractMethod::Ocr => Some((self.tesseract_cmd.clone(), vec![file, "stdout".into()])),
            ExtractMethod::Pdf => Some((self.pdftotext_cmd.clone(), vec![file, "-".into()])),
            ExtractMethod::Unsupported => None,
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String, ExtractError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn { program: program.to_owned(), source })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractError::Timeout { program: program.to_owned(), secs: self.timeout.as_secs() })?
            .map_err(|source| ExtractError::Spawn { program: program.to_owned(), source })?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                program: program.to_owned(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl TextExtractor for CommandExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let method = ExtractMethod::for_path(path);
        let Some((program, args)) = self.command_for(method, path) else {
            tracing::debug!(path = %path.display(), "unsupported file type, no text extracted");
            return Ok(String::new());
        };

        let text = self.run(&program, &args).await?;
        tracing::debug!(path = %path.display(), ?method, chars = text.len(), "text extracted");
        Ok(text)
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
