// src/extract/ocr.rs — Text recognition backends

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// Recognize text in a PNG image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, png: &[u8]) -> anyhow::Result<String>;
}

/// Runs the `tesseract` binary, feeding the image on stdin.
pub struct TesseractCli {
    command: String,
    language: String,
}

impl TesseractCli {
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            command: command.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, png: &[u8]) -> anyhow::Result<String> {
        let program = which::which(&self.command)
            .with_context(|| format!("OCR engine '{}' not found on PATH", self.command))?;

        let mut child = tokio::process::Command::new(&program)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_reports_command() {
        let ocr = TesseractCli::new("parley-no-such-ocr-binary", "eng");
        let err = ocr.recognize(b"\x89PNG").await.unwrap_err();
        assert!(err.to_string().contains("parley-no-such-ocr-binary"));
    }
}
