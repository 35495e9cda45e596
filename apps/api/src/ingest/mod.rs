//! CV ingestion: turns an uploaded PDF, DOCX or plain-text file into text.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

mod docx;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not extract text from {format:?} document: {reason}")]
    Extraction {
        format: DocumentFormat,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Detects the format from the file name, falling back to the declared content type.
    pub fn detect(file_name: Option<&str>, content_type: Option<&str>) -> Result<Self, IngestError> {
        if let Some(format) = file_name.and_then(Self::from_file_name) {
            return Ok(format);
        }
        if let Some(format) = content_type.and_then(Self::from_content_type) {
            return Ok(format);
        }
        Err(IngestError::UnsupportedFormat(
            file_name
                .or(content_type)
                .unwrap_or("unknown")
                .to_string(),
        ))
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "txt" | "text" | "md" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "text/plain" | "text/markdown" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }
}

/// Extracts plain text from a CV. CPU-bound; call from a blocking task.
///
/// Compressed formats can inflate far past the upload size, so the extracted
/// text is capped at `max_text_bytes`.
pub fn extract_text(
    bytes: &[u8],
    format: DocumentFormat,
    max_text_bytes: usize,
) -> Result<String, IngestError> {
    let text = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => {
            docx::extract(bytes, max_text_bytes).map_err(|reason| IngestError::Extraction {
                format,
                reason,
            })?
        }
        DocumentFormat::PlainText => extract_plain(bytes)?,
    };
    if text.len() > max_text_bytes {
        return Err(IngestError::Extraction {
            format,
            reason: format!("extracted text exceeds {max_text_bytes} bytes"),
        });
    }
    debug!(
        "Extracted {} chars from {:?} document ({} bytes)",
        text.len(),
        format,
        bytes.len()
    );
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));
    match outcome {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(IngestError::Extraction {
            format: DocumentFormat::Pdf,
            reason: format!("{e:?}"),
        }),
        Err(_) => {
            warn!("PDF parser panicked on a {}-byte upload", bytes.len());
            Err(IngestError::Extraction {
                format: DocumentFormat::Pdf,
                reason: "malformed PDF".to_string(),
            })
        }
    }
}

fn extract_plain(bytes: &[u8]) -> Result<String, IngestError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| IngestError::Extraction {
        format: DocumentFormat::PlainText,
        reason: e.to_string(),
    })
}
