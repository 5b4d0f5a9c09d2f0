//! Structured results produced by the pipelines.
//!
//! [`ComplianceReport`] is the contract between the compliance prompt in
//! [`crate::prompts`] and [`parse_report`]. [`CorrectedChunk`] is what the
//! correction pipeline stores per chunk before reassembly.

use crate::pipeline::postprocess::clean_reply;
use serde::{Deserialize, Serialize};

/// Kind of writing problem found in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Grammar,
    Style,
    Clarity,
    Professionalism,
    #[default]
    #[serde(other)]
    Other,
}

/// One problem reported by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    #[serde(default)]
    pub category: IssueCategory,
    /// What is wrong.
    pub issue: String,
    /// The offending words, if the model quoted them.
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub suggestion: String,
}

/// Compliance analysis of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Index of the analysed chunk. Set by the pipeline, not by the model.
    #[serde(default)]
    pub chunk_index: usize,
    pub compliant: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<ComplianceIssue>,
}

/// Shape accepted from the model: `compliant` may be omitted.
#[derive(Deserialize)]
struct RawReport {
    compliant: Option<bool>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    issues: Vec<ComplianceIssue>,
}

/// Parse a model reply into a [`ComplianceReport`].
///
/// Accepts the JSON object bare, fenced, or surrounded by prose. A missing
/// `compliant` flag is inferred from whether any issues were reported.
///
/// # Errors
/// Returns a human-readable reason when no JSON object can be decoded.
pub fn parse_report(reply: &str) -> Result<ComplianceReport, String> {
    let cleaned = clean_reply(reply);
    let json = extract_json_object(&cleaned)
        .ok_or_else(|| format!("no JSON object in reply: {:?}", preview(&cleaned)))?;

    let raw: RawReport =
        serde_json::from_str(json).map_err(|e| format!("invalid report JSON: {e}"))?;

    Ok(ComplianceReport {
        chunk_index: 0,
        compliant: raw.compliant.unwrap_or(raw.issues.is_empty()),
        summary: raw.summary,
        issues: raw.issues,
    })
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}

/// Correction result for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedChunk {
    pub chunk_index: usize,
    /// Corrected paragraphs; same count as the source chunk.
    pub paragraphs: Vec<String>,
    /// `true` when the reply broke paragraph structure and the original
    /// paragraphs were kept instead.
    pub fallback: bool,
}
