//! Paragraph-aligned chunking.
//!
//! A document is modelled as an ordered list of paragraphs. The chunker groups
//! consecutive paragraphs greedily into chunks whose text (paragraphs joined
//! by a blank line) stays within `max_chars`. A paragraph is never split: one
//! that is longer than the limit on its own becomes a single oversized chunk.
//!
//! Every chunk remembers its paragraphs individually so the correction
//! pipeline can map a corrected chunk back onto exactly the same number of
//! output paragraphs.

use crate::error::DocFixError;
use serde::{Deserialize, Serialize};

/// Separator placed between paragraphs inside a chunk's text.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

/// A contiguous run of whole paragraphs sent to the model as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position of this chunk in the document.
    pub index: usize,
    /// The paragraphs, in document order. Never empty.
    pub paragraphs: Vec<String>,
}

impl Chunk {
    /// Chunk text as sent to the model.
    pub fn text(&self) -> String {
        self.paragraphs.join(PARAGRAPH_SEPARATOR)
    }

    /// Length of [`Chunk::text`] in characters.
    pub fn char_len(&self) -> usize {
        joined_len(&self.paragraphs)
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }
}

/// Group `paragraphs` into chunks of at most `max_chars` characters.
///
/// # Errors
/// [`DocFixError::EmptyDocument`] when `paragraphs` is empty.
pub fn chunk_paragraphs<S: AsRef<str>>(
    paragraphs: &[S],
    max_chars: usize,
) -> Result<Vec<Chunk>, DocFixError> {
    if paragraphs.is_empty() {
        return Err(DocFixError::EmptyDocument {
            filename: String::new(),
        });
    }

    let separator_len = PARAGRAPH_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for para in paragraphs {
        let para = para.as_ref();
        let para_len = para.chars().count();

        if !current.is_empty() && current_len + separator_len + para_len > max_chars {
            chunks.push(Chunk {
                index: chunks.len(),
                paragraphs: std::mem::take(&mut current),
            });
            current_len = 0;
        }

        if current.is_empty() {
            current_len = para_len;
        } else {
            current_len += separator_len + para_len;
        }
        current.push(para.to_string());
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            paragraphs: current,
        });
    }

    Ok(chunks)
}

/// Split free text into paragraphs.
///
/// Paragraphs are separated by one or more blank lines. Line breaks inside a
/// paragraph collapse to a single space so no paragraph carries a hard break.
/// Whitespace-only paragraphs are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut paragraphs = Vec::new();
    let mut lines: Vec<&str> = Vec::new();

    for line in normalised.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush_paragraph(&mut lines, &mut paragraphs);
        } else {
            lines.push(line);
        }
    }
    flush_paragraph(&mut lines, &mut paragraphs);

    paragraphs
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if !lines.is_empty() {
        out.push(lines.join(" "));
        lines.clear();
    }
}

fn joined_len(paragraphs: &[String]) -> usize {
    let text: usize = paragraphs.iter().map(|p| p.chars().count()).sum();
    text + PARAGRAPH_SEPARATOR.chars().count() * paragraphs.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn para(c: char, len: usize) -> String {
        std::iter::repeat(c).take(len).collect()
    }

    #[test]
    fn two_paragraphs_that_do_not_fit_together() {
        let paras = vec![para('a', 1500), para('b', 1000)];
        let chunks = chunk_paragraphs(&paras, 2000).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].paragraphs, vec![paras[0].clone()]);
        assert_eq!(chunks[1].paragraphs, vec![paras[1].clone()]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn small_paragraphs_are_grouped() {
        let paras = vec!["one", "two", "three"];
        let chunks = chunk_paragraphs(&paras, 2000).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text(), "one\n\ntwo\n\nthree");
        assert_eq!(chunks[0].paragraph_count(), 3);
    }

    #[test]
    fn separator_counts_towards_limit() {
        // 5 + 2 + 5 = 12 > 11, so the second paragraph starts a new chunk.
        let paras = vec!["aaaaa", "bbbbb"];
        assert_eq!(chunk_paragraphs(&paras, 11).unwrap().len(), 2);
        assert_eq!(chunk_paragraphs(&paras, 12).unwrap().len(), 1);
    }

    #[test]
    fn oversized_paragraph_is_its_own_chunk() {
        let paras = vec![para('x', 10), para('y', 50), para('z', 10)];
        let chunks = chunk_paragraphs(&paras, 20).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].paragraphs, vec![para('y', 50)]);
        assert_eq!(chunks[1].char_len(), 50);
    }

    #[test]
    fn length_is_measured_in_chars_not_bytes() {
        // 4 chars each, 8 bytes each in UTF-8
        let paras = vec!["éééé", "üüüü"];
        let chunks = chunk_paragraphs(&paras, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_len(), 10);
    }

    #[test]
    fn empty_input_is_an_error() {
        let paras: Vec<String> = vec![];
        assert!(matches!(
            chunk_paragraphs(&paras, 2000),
            Err(DocFixError::EmptyDocument { .. })
        ));
    }

    #[test]
    fn split_paragraphs_on_blank_lines() {
        let text = "First line\ncontinues here.\n\n\n  Second paragraph.  \r\n\r\nThird.";
        assert_eq!(
            split_paragraphs(text),
            vec![
                "First line continues here.".to_string(),
                "Second paragraph.".to_string(),
                "Third.".to_string()
            ]
        );
    }

    #[test]
    fn split_paragraphs_of_blank_text_is_empty() {
        assert!(split_paragraphs("  \n\n \t \n").is_empty());
    }

    fn paragraph_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z .,é]{1,120}", 1..40)
    }

    proptest! {
        /// Concatenating every chunk's paragraphs reproduces the input.
        #[test]
        fn chunks_reconstruct_paragraphs(paras in paragraph_strategy(), max in 1usize..400) {
            let chunks = chunk_paragraphs(&paras, max).unwrap();
            let rebuilt: Vec<String> = chunks.iter().flat_map(|c| c.paragraphs.clone()).collect();
            prop_assert_eq!(rebuilt, paras);
        }

        /// Only a lone oversized paragraph may exceed the limit.
        #[test]
        fn chunks_respect_size_bound(paras in paragraph_strategy(), max in 1usize..400) {
            for chunk in chunk_paragraphs(&paras, max).unwrap() {
                prop_assert!(!chunk.paragraphs.is_empty());
                if chunk.char_len() > max {
                    prop_assert_eq!(chunk.paragraph_count(), 1);
                }
            }
        }

        /// Same input, same chunks; indices are sequential.
        #[test]
        fn chunking_is_deterministic(paras in paragraph_strategy(), max in 1usize..400) {
            let a = chunk_paragraphs(&paras, max).unwrap();
            let b = chunk_paragraphs(&paras, max).unwrap();
            for (i, c) in a.iter().enumerate() {
                prop_assert_eq!(c.index, i);
            }
            prop_assert_eq!(a, b);
        }
    }
}
