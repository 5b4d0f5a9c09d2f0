//! Error types for the edgequake-docfix library.
//!
//! Three error types, one per layer:
//!
//! * [`DocFixError`]: **Fatal for the request or the job**: unsupported
//!   upload, unknown file id, a trigger while a pipeline is in flight, or a
//!   pipeline that could not finish. Returned from every public operation and
//!   recorded on the job as its `error_message` when a pipeline fails.
//!
//! * [`ChunkError`]: **One chunk failed**: the model call errored, timed out
//!   or answered with something unparseable. The pipeline converts the first
//!   `ChunkError` into [`DocFixError::ServiceFailure`] and halts the job.
//!
//! * [`ServiceError`]: what a [`crate::pipeline::llm::LanguageService`]
//!   implementation reports for a single call, before retry bookkeeping
//!   attaches the chunk index.

use crate::store::JobStatus;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docfix library.
#[derive(Debug, Error)]
pub enum DocFixError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// Upload is neither a PDF nor a DOCX (by extension or magic bytes).
    #[error("Unsupported format for '{filename}': only PDF and DOCX files are supported")]
    UnsupportedFormat { filename: String },

    /// The document yielded no extractable paragraphs.
    #[error("Document '{filename}' contains no extractable paragraphs")]
    EmptyDocument { filename: String },

    /// The container looked right but its content could not be read.
    #[error("Failed to extract text from '{filename}': {detail}")]
    ExtractionFailed { filename: String, detail: String },

    // ── Job-table errors ──────────────────────────────────────────────────
    /// No job with this file id.
    #[error("File not found: '{file_id}'")]
    NotFound { file_id: String },

    /// A job with this file id already exists.
    #[error("Job '{file_id}' already exists")]
    DuplicateJob { file_id: String },

    /// The requested operation is not allowed in the job's current status.
    #[error("Job '{file_id}' is currently {status}: {detail}")]
    InvalidState {
        file_id: String,
        status: JobStatus,
        detail: String,
    },

    /// Download requested before the corrected document exists.
    #[error("Document correction not complete for '{file_id}'. Current status: {status}")]
    NotReady { file_id: String, status: JobStatus },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The language-model service failed for a chunk (error, timeout, bad reply).
    #[error("Language model failure: {detail}")]
    ServiceFailure { chunk: usize, detail: String },

    /// The corrected document could not be written or persisted.
    #[error("Failed to assemble corrected document: {detail}")]
    AssemblyFailure { detail: String },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked task, poisoned invariant).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single chunk's model call, after retries.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The service returned an error on every attempt.
    #[error("Chunk {chunk}: language model call failed after {retries} retries: {detail}")]
    ServiceFailed {
        chunk: usize,
        retries: u32,
        detail: String,
    },

    /// The last attempt did not answer within the configured timeout.
    #[error("Chunk {chunk}: language model call timed out after {secs}s")]
    Timeout { chunk: usize, secs: u64 },

    /// The service answered, but the reply could not be interpreted.
    #[error("Chunk {chunk}: malformed language model response: {detail}")]
    MalformedResponse { chunk: usize, detail: String },
}

impl ChunkError {
    /// Index of the chunk that failed.
    pub fn chunk(&self) -> usize {
        match self {
            ChunkError::ServiceFailed { chunk, .. }
            | ChunkError::Timeout { chunk, .. }
            | ChunkError::MalformedResponse { chunk, .. } => *chunk,
        }
    }
}

impl From<ChunkError> for DocFixError {
    fn from(err: ChunkError) -> Self {
        DocFixError::ServiceFailure {
            chunk: err.chunk(),
            detail: err.to_string(),
        }
    }
}

/// Error reported by a language-model service implementation for one call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport or API error from the provider.
    #[error("{0}")]
    Api(String),

    /// The provider answered but the content is not usable.
    #[error("{0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = DocFixError::UnsupportedFormat {
            filename: "notes.txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains("PDF and DOCX"), "got: {msg}");
    }

    #[test]
    fn invalid_state_display_names_status() {
        let e = DocFixError::InvalidState {
            file_id: "abc".into(),
            status: JobStatus::ProcessingCorrection,
            detail: "a pipeline is already running".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("processing_correction"), "got: {msg}");
        assert!(msg.contains("abc"));
    }

    #[test]
    fn chunk_timeout_converts_to_service_failure() {
        let e: DocFixError = ChunkError::Timeout { chunk: 4, secs: 60 }.into();
        match e {
            DocFixError::ServiceFailure { chunk, detail } => {
                assert_eq!(chunk, 4);
                assert!(detail.contains("60s"), "got: {detail}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn chunk_error_reports_index() {
        let e = ChunkError::MalformedResponse {
            chunk: 7,
            detail: "no JSON object".into(),
        };
        assert_eq!(e.chunk(), 7);
        assert!(e.to_string().contains("no JSON object"));
    }

    #[test]
    fn not_ready_display() {
        let e = DocFixError::NotReady {
            file_id: "f1".into(),
            status: JobStatus::ComplianceComplete,
        };
        assert!(e.to_string().contains("compliance_complete"));
    }
}
