//! Text extraction from uploaded menu files.
//!
//! [`TextExtractor`] is the seam the worker depends on; [`DocumentExtractor`]
//! is the shipped implementation that fetches the blob and dispatches on the
//! detected [`DocumentFormat`].

pub mod docx;
pub mod fetch;
pub mod pdf;
pub mod text;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info_span, Instrument};

use crate::config::ExtractorConfig;
use crate::model::MenuUpload;
use crate::sanitize::redact_url;

use fetch::BlobFetcher;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported upload: {0}")]
    Unsupported(String),

    #[error("Unsupported upload: upload file is empty")]
    Empty,

    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to read upload file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF processing error: {0}")]
    Pdf(String),

    #[error("DOCX processing error: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    Pdf,
    Docx,
    Plain,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionSource::Pdf => "pdf",
            ExtractionSource::Docx => "docx",
            ExtractionSource::Plain => "plain",
        }
    }
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    pub source: ExtractionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, upload: &MenuUpload) -> Result<ExtractedText, ExtractError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    /// Maps a content type (parameters such as `; charset=` ignored).
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            DOCX_MIME => Some(DocumentFormat::Docx),
            other if other.starts_with("text/") => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            return None;
        }
        mime_guess::from_ext(&ext)
            .iter()
            .find_map(|mime| Self::from_mime(mime.essence_str()))
    }

    /// Resolution order: content-type header, `file_name` extension, URL
    /// path extension.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>, url: &str) -> Option<Self> {
        content_type
            .and_then(Self::from_mime)
            .or_else(|| file_name.and_then(extension_of).and_then(Self::from_extension))
            .or_else(|| url_path_extension(url).and_then(Self::from_extension))
    }

    pub fn source(&self) -> ExtractionSource {
        match self {
            DocumentFormat::Pdf => ExtractionSource::Pdf,
            DocumentFormat::Docx => ExtractionSource::Docx,
            DocumentFormat::Text => ExtractionSource::Plain,
        }
    }
}

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

fn url_path_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    extension_of(last_segment)
}

/// Extracts text from bytes already known to be `format`.
pub fn extract_bytes(bytes: &[u8], format: DocumentFormat) -> Result<ExtractedText, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }

    let (text, page_count) = match format {
        DocumentFormat::Pdf => {
            let (text, pages) = pdf::extract_pdf(bytes)?;
            (text, Some(pages))
        }
        DocumentFormat::Docx => (docx::extract_docx(bytes)?, None),
        DocumentFormat::Text => (text::decode_text(bytes), None),
    };

    if text.trim().is_empty() {
        return Err(ExtractError::Unsupported("no readable text".to_string()));
    }

    Ok(ExtractedText {
        text,
        source: format.source(),
        page_count,
    })
}

/// Fetches the upload's blob and extracts PDF, DOCX or plain text.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    fetcher: BlobFetcher,
}

impl DocumentExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            fetcher: BlobFetcher::new(config.fetch_timeout_secs)?,
        })
    }
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, upload: &MenuUpload) -> Result<ExtractedText, ExtractError> {
        let url = redact_url(&upload.file_url);
        let blob = self
            .fetcher
            .fetch(&upload.file_url)
            .instrument(info_span!("extractor.fetch", url = %url))
            .await?;

        if blob.bytes.is_empty() {
            return Err(ExtractError::Empty);
        }

        let format = DocumentFormat::detect(
            blob.content_type.as_deref(),
            upload.file_name.as_deref(),
            &upload.file_url,
        )
        .ok_or_else(|| {
            ExtractError::Unsupported(format!(
                "unrecognized file type (content type: {})",
                blob.content_type.as_deref().unwrap_or("unknown")
            ))
        })?;

        let _span = info_span!("extractor.extract", format = ?format, bytes = blob.bytes.len())
            .entered();
        extract_bytes(&blob.bytes, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn upload_for(file_url: &str, file_name: Option<&str>) -> MenuUpload {
        let now = chrono::Utc::now();
        MenuUpload {
            id: 1,
            restaurant_id: Some(7),
            menu_id: None,
            file_url: file_url.to_string(),
            file_name: file_name.map(str::to_string),
            file_size: None,
            resource_type: None,
            status: crate::model::UploadStatus::Pending,
            parser_version: None,
            ai_model: None,
            processed_at: None,
            failure_reason: None,
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_from_mime_ignores_parameters() {
        assert_eq!(
            DocumentFormat::from_mime("text/plain; charset=utf-8"),
            Some(DocumentFormat::Text)
        );
        assert_eq!(
            DocumentFormat::from_mime("Application/PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_mime(DOCX_MIME), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_mime("image/png"), None);
        assert_eq!(DocumentFormat::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension(".DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("jpg"), None);
        assert_eq!(DocumentFormat::from_extension(""), None);
    }

    #[test]
    fn test_detect_header_beats_extension() {
        let format = DocumentFormat::detect(
            Some("application/pdf"),
            Some("menu.txt"),
            "https://cdn.example.com/menu.docx",
        );
        assert_eq!(format, Some(DocumentFormat::Pdf));
    }

    #[test]
    fn test_detect_falls_back_to_file_name_then_url() {
        assert_eq!(
            DocumentFormat::detect(
                Some("application/octet-stream"),
                Some("menu.docx"),
                "https://cdn.example.com/blob/123"
            ),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(
            DocumentFormat::detect(None, None, "https://cdn.example.com/menus/dinner.pdf?sig=1"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::detect(None, Some("photo.jpg"), "https://cdn.example.com/x"),
            None
        );
    }

    #[test]
    fn test_extract_bytes_empty_is_unsupported() {
        let err = extract_bytes(b"", DocumentFormat::Text).unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
        assert!(err.to_string().contains("Unsupported upload"));
    }

    #[test]
    fn test_extract_bytes_whitespace_is_unsupported() {
        let err = extract_bytes(b"  \n\t ", DocumentFormat::Text).unwrap_err();
        assert!(err.to_string().contains("no readable text"));
    }

    #[test]
    fn test_extract_bytes_plain() {
        let extracted = extract_bytes(b"Truffle Fries 6.50", DocumentFormat::Text).unwrap();
        assert_eq!(extracted.text, "Truffle Fries 6.50");
        assert_eq!(extracted.source, ExtractionSource::Plain);
        assert_eq!(extracted.page_count, None);
    }

    #[tokio::test]
    async fn test_document_extractor_reads_local_file() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "Soup of the day 5.00").unwrap();

        let extractor = DocumentExtractor::new(&ExtractorConfig::default()).unwrap();
        let upload = upload_for(file.path().to_str().unwrap(), None);
        let extracted = extractor.extract(&upload).await.unwrap();

        assert!(extracted.text.contains("Soup of the day"));
        assert_eq!(extracted.source, ExtractionSource::Plain);
    }

    #[tokio::test]
    async fn test_document_extractor_unknown_type_is_unsupported() {
        let mut file = NamedTempFile::with_suffix(".bin").unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let extractor = DocumentExtractor::new(&ExtractorConfig::default()).unwrap();
        let upload = upload_for(file.path().to_str().unwrap(), Some("scan.bin"));
        let err = extractor.extract(&upload).await.unwrap_err();

        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_document_extractor_empty_file() {
        let file = NamedTempFile::with_suffix(".txt").unwrap();

        let extractor = DocumentExtractor::new(&ExtractorConfig::default()).unwrap();
        let upload = upload_for(file.path().to_str().unwrap(), None);
        let err = extractor.extract(&upload).await.unwrap_err();

        assert!(matches!(err, ExtractError::Empty));
    }

    #[tokio::test]
    async fn test_document_extractor_missing_file() {
        let extractor = DocumentExtractor::new(&ExtractorConfig::default()).unwrap();
        let upload = upload_for("/nonexistent/menu.pdf", None);
        let err = extractor.extract(&upload).await.unwrap_err();

        assert!(matches!(err, ExtractError::ReadFile { .. }));
    }
}
