//! Post-processing: deterministic cleanup of language-model replies.
//!
//! Even well-prompted models wrap their answer in artefacts the prompt asked
//! them not to produce:
//!
//! - ` ```text ... ``` ` or ` ```json ... ``` ` fences around the whole reply
//! - an echoed `CORRECTED TEXT:` label copied from the end of the prompt
//! - Windows-style `\r\n` line endings and trailing spaces
//! - zero-width spaces and BOMs that survive into the output document
//!
//! These rules fix such quirks without touching the prose itself. Paragraph
//! boundaries (blank lines) are preserved because the correction pipeline
//! counts them.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the reply exactly as the model sent it; the label is removed after
//! trimming so leading whitespace does not hide it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
///
/// Rules (applied in order):
/// 1. Strip outer code fences (any language tag)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Strip an echoed `CORRECTED TEXT:` style label on the first line
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading and trailing blank space
pub fn clean_reply(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = strip_echoed_label(s.trim_start());
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Strip echoed prompt label ────────────────────────────────────────

static RE_ECHOED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\*\*)?(?:corrected text|corrected version|correction)(?:\*\*)?\s*:(?:\*\*)?[ \t]*\n?")
        .unwrap()
});

fn strip_echoed_label(input: &str) -> String {
    RE_ECHOED_LABEL.replace(input, "").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language() {
        let input = "```text\nHello there.\n\nSecond.\n```";
        assert_eq!(strip_code_fences(input), "Hello there.\n\nSecond.");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_no_fences_passthrough() {
        let input = "Plain reply.";
        assert_eq!(strip_code_fences(input), "Plain reply.");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_strip_echoed_label() {
        assert_eq!(strip_echoed_label("CORRECTED TEXT:\nFine."), "Fine.");
        assert_eq!(strip_echoed_label("**Corrected text:** Fine."), "Fine.");
        assert_eq!(
            strip_echoed_label("Correctness matters."),
            "Correctness matters."
        );
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_clean_reply_keeps_paragraph_breaks() {
        let input = "```\r\nCORRECTED TEXT:\r\nFirst one.  \r\n\r\nSecond\u{200B} one.\r\n```";
        assert_eq!(clean_reply(input), "First one.\n\nSecond one.");
    }
}
