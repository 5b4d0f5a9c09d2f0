//! Prompts for compliance analysis and correction.
//!
//! Every prompt lives here so changing the model's instructions never touches
//! retry or ordering logic, and tests can inspect prompts without a model.
//!
//! Callers can override either prompt via
//! [`crate::config::ServiceConfig::compliance_prompt`] and
//! [`crate::config::ServiceConfig::correction_prompt`]; an override must keep
//! the `{chunk}` placeholder.

/// Placeholder replaced with the chunk text.
pub const CHUNK_PLACEHOLDER: &str = "{chunk}";

/// System message sent with every request.
pub const EDITOR_SYSTEM_PROMPT: &str = "You are a meticulous professional English editor. \
You follow output-format instructions exactly and never add commentary.";

/// Default prompt for compliance analysis of one chunk.
///
/// The JSON shape requested here is the contract parsed by
/// [`crate::report::parse_report`].
pub const DEFAULT_COMPLIANCE_PROMPT: &str = r#"Check the following text for compliance with English grammar, style, clarity, and professional writing rules.

Return ONLY a JSON object with this exact structure:
{
  "compliant": true | false,
  "summary": "one or two sentences describing the overall quality",
  "issues": [
    {
      "category": "grammar" | "style" | "clarity" | "professionalism" | "other",
      "issue": "what is wrong",
      "excerpt": "the offending words, copied verbatim",
      "suggestion": "how to fix it"
    }
  ]
}

Use an empty "issues" array when the text has no problems.
Do NOT wrap the JSON in code fences and do NOT add any commentary.

TEXT:
{chunk}"#;

/// Default prompt for correcting one chunk.
///
/// Paragraphs are separated by blank lines; the reply must keep the same
/// number of paragraphs or the pipeline falls back to the original text.
pub const DEFAULT_CORRECTION_PROMPT: &str = r#"Correct the following text to fully comply with English grammar, style, clarity, and professional writing rules.

INSTRUCTIONS:
1. Return ONLY the corrected text.
2. Do NOT add any explanations, summaries, or extra comments.
3. Keep the original paragraph structure: the text has exactly {paragraphs} paragraph(s) separated by blank lines, and your answer must have exactly {paragraphs} paragraph(s) separated by blank lines.
4. Maintain the original meaning.

ORIGINAL TEXT:
{chunk}

CORRECTED TEXT:"#;

/// Build the compliance prompt for `chunk`.
pub fn compliance_prompt(template: Option<&str>, chunk: &str) -> String {
    template
        .unwrap_or(DEFAULT_COMPLIANCE_PROMPT)
        .replace(CHUNK_PLACEHOLDER, chunk)
}

/// Build the correction prompt for `chunk`, which holds `paragraphs` paragraphs.
pub fn correction_prompt(template: Option<&str>, chunk: &str, paragraphs: usize) -> String {
    // Substitute the count first so a literal "{paragraphs}" inside the chunk survives.
    template
        .unwrap_or(DEFAULT_CORRECTION_PROMPT)
        .replace("{paragraphs}", &paragraphs.to_string())
        .replace(CHUNK_PLACEHOLDER, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliance_prompt_embeds_chunk() {
        let p = compliance_prompt(None, "Their going home.");
        assert!(p.ends_with("TEXT:\nTheir going home."));
        assert!(p.contains("\"issues\""));
        assert!(!p.contains(CHUNK_PLACEHOLDER));
    }

    #[test]
    fn correction_prompt_states_paragraph_count() {
        let p = correction_prompt(None, "One.\n\nTwo.", 2);
        assert!(p.contains("exactly 2 paragraph(s)"));
        assert!(p.contains("ORIGINAL TEXT:\nOne.\n\nTwo.\n\nCORRECTED TEXT:"));
    }

    #[test]
    fn chunk_text_is_not_reinterpreted() {
        let p = correction_prompt(None, "literal {paragraphs} here", 1);
        assert!(p.contains("literal {paragraphs} here"));
    }

    #[test]
    fn custom_template_is_used() {
        let p = compliance_prompt(Some("Review: {chunk}"), "abc");
        assert_eq!(p, "Review: abc");
    }
}
