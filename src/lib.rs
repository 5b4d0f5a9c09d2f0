//! # edgequake-docfix
//!
//! Check PDF and DOCX documents for grammar, style and professionalism with
//! LLMs, then produce a corrected DOCX.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF | DOCX)
//!  │
//!  ├─ 1. Extract    paragraphs via pdf-extract / word/document.xml (spawn_blocking)
//!  ├─ 2. Chunk      group whole paragraphs up to max_chunk_chars
//!  ├─ 3. Compliance one JSON report per chunk, concurrent, committed in order
//!  ├─ 4. Correction one rewritten chunk per chunk, paragraph count preserved
//!  └─ 5. Assemble   corrected paragraphs → DOCX in output_dir
//! ```
//!
//! Every upload becomes a job in a [`JobStore`]; its [`JobStatus`] moves
//! `uploaded → processing_compliance → compliance_complete →
//! processing_correction → correction_complete`, or to `error`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docfix::{DocumentService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let service = DocumentService::new(ServiceConfig::default())?;
//!
//!     let bytes = std::fs::read("report.docx")?;
//!     let receipt = service.upload("report.docx", bytes).await?;
//!
//!     service.start_compliance(&receipt.file_id).await?.wait().await?;
//!     for report in service.status(&receipt.file_id).await?.compliance_reports {
//!         println!("chunk {}: {} issue(s)", report.chunk_index, report.issues.len());
//!     }
//!
//!     service.start_correction(&receipt.file_id).await?.wait().await?;
//!     let download = service.download(&receipt.file_id).await?;
//!     std::fs::write(&download.filename, &download.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | HTTP surface ([`server`]) and the `docfix` binary (axum + clap + tracing-subscriber) |
//!
//! Disable `server` when embedding only the library:
//! ```toml
//! edgequake-docfix = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chunker::{chunk_paragraphs, split_paragraphs, Chunk, DEFAULT_MAX_CHUNK_CHARS};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use document::{DocumentAdapter, DocumentFormat, OfficeAdapter};
pub use error::{ChunkError, DocFixError, ServiceError};
pub use pipeline::llm::{LanguageService, LlmService};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use report::{ComplianceIssue, ComplianceReport, CorrectedChunk, IssueCategory};
pub use service::{Download, DocumentService, JobHandle, StatusReport, UploadReceipt};
pub use store::{Job, JobStatus, JobStore, MemoryJobStore, NewJob, Operation};
