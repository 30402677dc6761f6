// src/extract/mod.rs — Turn uploaded files into chat text
//
// Supported uploads: plain text, PDF, PNG and JPEG. Extracted text is sent as
// if the user had typed it; an empty result is reported, never submitted.

pub mod imaging;
pub mod ocr;
pub mod pdf;

use std::path::Path;
use std::sync::Arc;

use crate::infra::config::ExtractConfig;
use crate::infra::errors::ParleyError;

pub use imaging::ImageOptions;
pub use ocr::{TesseractCli, TextRecognizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    PlainText,
    Pdf,
    Png,
    Jpeg,
}

impl MediaType {
    /// Detect by file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ParleyError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(MediaType::PlainText),
            "pdf" => Ok(MediaType::Pdf),
            "png" => Ok(MediaType::Png),
            "jpg" | "jpeg" => Ok(MediaType::Jpeg),
            other => Err(ParleyError::UnsupportedFileType {
                file: path.display().to_string(),
                media_type: if other.is_empty() {
                    "unknown".into()
                } else {
                    format!(".{other}")
                },
            }),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::PlainText => "text/plain",
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }
}

/// Stateless file-to-text conversion.
pub struct Extractor {
    recognizer: Arc<dyn TextRecognizer>,
    image: ImageOptions,
    max_upload_bytes: u64,
}

impl Extractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, image: ImageOptions, max_upload_bytes: u64) -> Self {
        Self {
            recognizer,
            image,
            max_upload_bytes,
        }
    }

    /// Extractor backed by the tesseract CLI.
    pub fn from_config(config: &ExtractConfig) -> Self {
        Self::new(
            Arc::new(TesseractCli::new(&config.ocr_command, &config.ocr_language)),
            ImageOptions {
                blur_sigma: config.blur_sigma,
                contrast: config.contrast,
            },
            config.max_upload_bytes(),
        )
    }

    /// Extract text from raw bytes. `name` only labels errors and logs.
    pub async fn extract_text(
        &self,
        bytes: &[u8],
        media_type: MediaType,
        name: &str,
    ) -> Result<String, ParleyError> {
        let text = match media_type {
            MediaType::PlainText => decode_text(bytes),
            MediaType::Pdf => pdf::pdf_text(bytes).map_err(|e| ParleyError::Extraction {
                file: name.to_string(),
                message: e.to_string(),
            })?,
            MediaType::Png | MediaType::Jpeg => {
                let png = imaging::prepare_for_ocr(bytes, &self.image)?;
                self.recognizer
                    .recognize(&png)
                    .await
                    .map_err(|e| ParleyError::Extraction {
                        file: name.to_string(),
                        message: e.to_string(),
                    })?
                    .trim()
                    .to_string()
            }
        };

        if text.is_empty() {
            return Err(ParleyError::ExtractionEmpty {
                file: name.to_string(),
            });
        }
        tracing::info!(
            file = name,
            media_type = media_type.mime(),
            chars = text.chars().count(),
            "Extracted text"
        );
        Ok(text)
    }

    /// Read and extract a file from disk, enforcing the upload size limit.
    pub async fn extract_file(&self, path: &Path) -> Result<String, ParleyError> {
        let media_type = MediaType::from_path(path)?;
        let name = path.display().to_string();

        let size = tokio::fs::metadata(path).await?.len();
        if size > self.max_upload_bytes {
            return Err(ParleyError::FileTooLarge {
                file: name,
                size,
                limit: self.max_upload_bytes,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        self.extract_text(&bytes, media_type, &name).await
    }
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_media_type_from_path() {
        assert_eq!(
            MediaType::from_path(&PathBuf::from("notes.TXT")).unwrap(),
            MediaType::PlainText
        );
        assert_eq!(
            MediaType::from_path(&PathBuf::from("scan.jpeg")).unwrap(),
            MediaType::Jpeg
        );
        assert_eq!(
            MediaType::from_path(&PathBuf::from("a/b/menu.pdf")).unwrap(),
            MediaType::Pdf
        );
    }

    #[test]
    fn test_unsupported_extension_is_warning() {
        let err = MediaType::from_path(&PathBuf::from("cat.gif")).unwrap_err();
        assert!(err.is_warning());
        assert!(err.to_string().contains(".gif"));

        let err = MediaType::from_path(&PathBuf::from("Makefile")).unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_media_type_labels() {
        assert_eq!(MediaType::Pdf.mime(), "application/pdf");
        assert_eq!(MediaType::Jpeg.mime(), "image/jpeg");
    }

    #[test]
    fn test_decode_text_strips_bom_and_whitespace() {
        assert_eq!(decode_text(b"\xef\xbb\xbf  hello\n"), "hello");
        assert_eq!(decode_text(b"\n\n"), "");
    }
}
