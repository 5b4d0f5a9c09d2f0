//! Document loading and writing.
//!
//! Uploads are either PDF or DOCX. Both are reduced to an ordered list of
//! paragraphs; output is always DOCX, one paragraph per input paragraph.
//!
//! The [`DocumentAdapter`] trait is the seam between the pipelines and the
//! file formats, so tests can swap in an adapter that fails on demand.

pub mod docx;
pub mod pdf;

use crate::error::DocFixError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

impl DocumentFormat {
    /// Detect the format from the filename extension, then confirm it with
    /// the file's magic bytes.
    ///
    /// # Errors
    /// [`DocFixError::UnsupportedFormat`] when the extension is neither
    /// `.pdf` nor `.docx`, or the content does not match it.
    pub fn detect(filename: &str, bytes: &[u8]) -> Result<Self, DocFixError> {
        let unsupported = || DocFixError::UnsupportedFormat {
            filename: filename.to_string(),
        };

        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(unsupported)?;

        let (format, magic) = match ext.as_str() {
            "pdf" => (DocumentFormat::Pdf, PDF_MAGIC),
            "docx" => (DocumentFormat::Docx, ZIP_MAGIC),
            _ => return Err(unsupported()),
        };

        if !bytes.starts_with(magic) {
            return Err(unsupported());
        }
        Ok(format)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Reads paragraphs out of uploads and writes corrected documents.
///
/// Both methods are CPU-bound and synchronous; async callers run them on a
/// blocking thread.
pub trait DocumentAdapter: Send + Sync {
    /// Ordered, non-empty paragraphs of the document. May return an empty
    /// list; the caller decides whether that is an error.
    fn extract_paragraphs(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<Vec<String>, DocFixError>;

    /// Serialise `paragraphs` as a DOCX package.
    fn write_document(&self, paragraphs: &[String]) -> Result<Vec<u8>, DocFixError>;
}

/// Default adapter: `pdf-extract` for PDF, a zip + WordprocessingML reader
/// and writer for DOCX.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfficeAdapter;

impl DocumentAdapter for OfficeAdapter {
    fn extract_paragraphs(
        &self,
        format: DocumentFormat,
        bytes: &[u8],
    ) -> Result<Vec<String>, DocFixError> {
        match format {
            DocumentFormat::Pdf => pdf::extract_paragraphs(bytes),
            DocumentFormat::Docx => docx::read_paragraphs(bytes),
        }
    }

    fn write_document(&self, paragraphs: &[String]) -> Result<Vec<u8>, DocFixError> {
        docx::write_paragraphs(paragraphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_and_docx() {
        assert_eq!(
            DocumentFormat::detect("report.PDF", b"%PDF-1.7\n...").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect("letter.docx", b"PK\x03\x04rest").unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["notes.txt", "archive.zip", "README", "doc.doc"] {
            assert!(
                matches!(
                    DocumentFormat::detect(name, b"PK\x03\x04"),
                    Err(DocFixError::UnsupportedFormat { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_mismatched_content() {
        assert!(DocumentFormat::detect("fake.pdf", b"PK\x03\x04").is_err());
        assert!(DocumentFormat::detect("fake.docx", b"%PDF-1.4").is_err());
        assert!(DocumentFormat::detect("empty.pdf", b"").is_err());
    }

    #[test]
    fn format_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentFormat::Docx).unwrap(),
            "\"docx\""
        );
        assert_eq!(DocumentFormat::Pdf.to_string(), "pdf");
    }
}
