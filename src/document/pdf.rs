//! PDF text extraction.
//!
//! `pdf-extract` yields the text layer page by page, with blank lines between
//! text blocks. Those blank lines are the only paragraph signal a PDF offers,
//! so paragraphs are recovered with [`split_paragraphs`].

use crate::chunker::split_paragraphs;
use crate::error::DocFixError;
use tracing::debug;

/// Extract the paragraphs of a PDF held in memory.
///
/// Scanned PDFs without a text layer yield an empty list.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocFixError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        DocFixError::ExtractionFailed {
            filename: String::new(),
            detail: format!("unreadable PDF: {e}"),
        }
    })?;

    let paragraphs = split_paragraphs(&text);
    debug!(
        chars = text.len(),
        paragraphs = paragraphs.len(),
        "Extracted PDF text"
    );
    Ok(paragraphs)
}
