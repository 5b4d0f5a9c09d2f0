//! DOCX reading and writing.
//!
//! A DOCX file is a zip package whose body lives in `word/document.xml`
//! (WordprocessingML). Only paragraph text matters here: formatting, tables
//! and images are not carried into the corrected document.
//!
//! Reading scans the XML tags with a regex rather than a full parser. Each
//! `<w:p>` element is one paragraph; its `<w:t>` runs are concatenated,
//! `<w:tab/>` becomes a tab and `<w:br/>` a space.

use crate::error::DocFixError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

// ── Reading ──────────────────────────────────────────────────────────────────

/// Paragraph boundaries, text runs, tabs and line breaks, in document order.
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>|</w:p>|<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab(?:\s[^>]*)?/>|<w:(?:br|cr)(?:\s[^>]*)?/>",
    )
    .unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#x([0-9A-Fa-f]+)|#([0-9]+)|(amp|lt|gt|quot|apos));").unwrap());

/// Read the non-empty paragraphs of a DOCX package, in document order.
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocFixError> {
    let xml = read_document_xml(bytes)?;
    Ok(paragraphs_from_xml(&xml))
}

fn read_document_xml(bytes: &[u8]) -> Result<String, DocFixError> {
    let failed = |detail: String| DocFixError::ExtractionFailed {
        filename: String::new(),
        detail,
    };

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| failed(format!("not a zip package: {e}")))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| failed(format!("missing {DOCUMENT_PART}: {e}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| failed(format!("unreadable {DOCUMENT_PART}: {e}")))?;
    Ok(xml)
}

/// Paragraphs are ordered by their opening tag. A paragraph nested inside
/// another (text boxes, `<w:txbxContent>`) is its own paragraph and does not
/// split the outer one.
fn paragraphs_from_xml(xml: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<usize> = Vec::new();

    for caps in RE_TOKEN.captures_iter(xml) {
        let tag = &caps[0];
        let piece = if let Some(run) = caps.get(1) {
            Some(unescape_xml(run.as_str()))
        } else if tag == "</w:p>" {
            open.pop();
            None
        } else if tag.starts_with("<w:tab") {
            Some("\t".to_string())
        } else if tag.starts_with("<w:br") || tag.starts_with("<w:cr") {
            Some(" ".to_string())
        } else if tag.ends_with("/>") {
            None
        } else {
            paragraphs.push(String::new());
            open.push(paragraphs.len() - 1);
            None
        };

        if let (Some(piece), Some(&current)) = (piece, open.last()) {
            paragraphs[current].push_str(&piece);
        }
    }

    paragraphs
        .into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    _ => Some('\''),
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Build a DOCX package with one paragraph per entry of `paragraphs`.
pub fn write_paragraphs(paragraphs: &[String]) -> Result<Vec<u8>, DocFixError> {
    let document = document_xml(paragraphs);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", RELS_XML),
        (DOCUMENT_PART, document.as_str()),
    ] {
        writer
            .start_file(name, options)
            .map_err(|e| assembly_failure(format!("failed to add '{name}': {e}")))?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| assembly_failure(format!("failed to write '{name}': {e}")))?;
    }

    let finished = writer
        .finish()
        .map_err(|e| assembly_failure(format!("failed to finalise package: {e}")))?;
    Ok(finished.into_inner())
}

fn assembly_failure(detail: String) -> DocFixError {
    DocFixError::AssemblyFailure { detail }
}

fn document_xml(paragraphs: &[String]) -> String {
    let mut xml = String::from(DOCUMENT_HEAD);
    for paragraph in paragraphs {
        xml.push_str("<w:p><w:r>");
        for (i, line) in paragraph.split('\n').enumerate() {
            if i > 0 {
                xml.push_str("<w:br/>");
            }
            for (j, segment) in line.split('\t').enumerate() {
                if j > 0 {
                    xml.push_str("<w:tab/>");
                }
                if !segment.is_empty() {
                    xml.push_str(r#"<w:t xml:space="preserve">"#);
                    xml.push_str(&escape_xml(segment));
                    xml.push_str("</w:t>");
                }
            }
        }
        xml.push_str("</w:r></w:p>");
    }
    xml.push_str(DOCUMENT_TAIL);
    xml
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file(DOCUMENT_PART, options).unwrap();
        let xml = format!("{DOCUMENT_HEAD}{body}{DOCUMENT_TAIL}");
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn write_then_read_preserves_paragraphs() {
        let paragraphs = vec![
            "First paragraph.".to_string(),
            "Fish & chips <cheap> \"quoted\" it's".to_string(),
            "Ünïcödé – ok".to_string(),
        ];
        let bytes = write_paragraphs(&paragraphs).unwrap();
        assert!(bytes.starts_with(b"PK\x03\x04"));
        assert_eq!(read_paragraphs(&bytes).unwrap(), paragraphs);
    }

    #[test]
    fn written_package_has_required_parts() {
        let bytes = write_paragraphs(&["x".to_string()]).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in ["[Content_Types].xml", "_rels/.rels", DOCUMENT_PART] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn runs_are_concatenated_and_entities_decoded() {
        let body = r#"<w:p w:rsidR="00A1"><w:pPr><w:pStyle w:val="Normal"/></w:pPr><w:r><w:t>Hello,</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> w&amp;orld&#33;</w:t></w:r></w:p>"#;
        let paragraphs = read_paragraphs(&docx_with_body(body)).unwrap();
        assert_eq!(paragraphs, vec!["Hello, w&orld!".to_string()]);
    }

    #[test]
    fn tabs_and_breaks() {
        let body = "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>";
        let paragraphs = read_paragraphs(&docx_with_body(body)).unwrap();
        assert_eq!(paragraphs, vec!["a\tb c".to_string()]);
    }

    #[test]
    fn text_box_paragraphs_do_not_cut_the_outer_paragraph() {
        let body = concat!(
            "<w:p><w:r><w:t>Before box.</w:t></w:r>",
            "<w:r><w:pict><v:shape><v:textbox><w:txbxContent>",
            "<w:p><w:r><w:t>Boxed one.</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>Boxed two.</w:t></w:r></w:p>",
            "</w:txbxContent></v:textbox></v:shape></w:pict></w:r>",
            "<w:r><w:t xml:space=\"preserve\"> After box.</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>Next.</w:t></w:r></w:p>",
        );
        let paragraphs = read_paragraphs(&docx_with_body(body)).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Before box. After box.", "Boxed one.", "Boxed two.", "Next."]
        );
    }

    #[test]
    fn empty_and_self_closing_paragraphs_are_skipped() {
        let body = r#"<w:p w:rsidR="1"/><w:p><w:r><w:t>One</w:t></w:r></w:p><w:p></w:p><w:p><w:r><w:t>   </w:t></w:r></w:p><w:p><w:r><w:t>Two</w:t></w:r></w:p>"#;
        let paragraphs = read_paragraphs(&docx_with_body(body)).unwrap();
        assert_eq!(paragraphs, vec!["One".to_string(), "Two".to_string()]);
    }

    #[test]
    fn tab_in_paragraph_round_trips() {
        let paragraphs = vec!["Name:\tValue".to_string()];
        let bytes = write_paragraphs(&paragraphs).unwrap();
        assert_eq!(read_paragraphs(&bytes).unwrap(), paragraphs);
    }

    #[test]
    fn corrupt_package_is_extraction_failure() {
        let err = read_paragraphs(b"PK\x03\x04 definitely not a zip").unwrap_err();
        assert!(matches!(err, DocFixError::ExtractionFailed { .. }), "got: {err:?}");
    }

    #[test]
    fn package_without_document_part_fails() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("other.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_paragraphs(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"), "got: {err}");
    }

    #[test]
    fn unknown_entities_are_left_alone() {
        assert_eq!(unescape_xml("a &nbsp; b &#x41;"), "a &nbsp; b A");
    }
}
