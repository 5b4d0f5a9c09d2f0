//! Orchestration: upload, trigger, poll and download.
//!
//! [`DocumentService`] is what the HTTP handlers and the CLI talk to. It
//! validates requests synchronously and hands long-running work to the
//! pipelines on background tasks.
//!
//! ```text
//! upload ──▶ detect format ──▶ extract paragraphs ──▶ chunk ──▶ store.create
//! start_* ─▶ store.begin ──▶ tokio::spawn(supervise(pipeline::*::run)) ──▶ JobHandle
//! status ──▶ store.get
//! download ─▶ store.get ──▶ read output_path
//! ```

use crate::chunker::chunk_paragraphs;
use crate::config::ServiceConfig;
use crate::document::{DocumentAdapter, DocumentFormat, OfficeAdapter};
use crate::error::DocFixError;
use crate::pipeline::llm::{LanguageService, LlmService};
use crate::pipeline::{compliance, correction, PipelineContext};
use crate::report::ComplianceReport;
use crate::store::{Job, JobStatus, JobStore, MemoryJobStore, NewJob, Operation};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// MIME type of the corrected document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub file_id: String,
    pub message: String,
    pub format: DocumentFormat,
    pub paragraph_count: usize,
    pub chunk_count: usize,
}

/// Snapshot returned by [`DocumentService::status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub file_id: String,
    pub status: JobStatus,
    pub compliance_reports: Vec<ComplianceReport>,
    pub message: String,
}

/// The corrected document, ready to send.
#[derive(Debug, Clone)]
pub struct Download {
    /// `corrected_<original stem>.docx`
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A running pipeline.
///
/// Dropping the handle detaches the task; it keeps running and records its
/// outcome on the job.
#[derive(Debug)]
pub struct JobHandle {
    file_id: String,
    operation: Operation,
    handle: JoinHandle<Result<(), DocFixError>>,
}

impl JobHandle {
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Message returned to the client when the pipeline is started.
    pub fn accepted_message(&self) -> &'static str {
        match self.operation {
            Operation::Compliance => "Compliance checking started. Check status for progress.",
            Operation::Correction => "Document correction started. Check status for progress.",
        }
    }

    /// Wait for the pipeline to finish.
    pub async fn wait(self) -> Result<(), DocFixError> {
        self.handle
            .await
            .map_err(|e| DocFixError::Internal(format!("{} task failed: {e}", self.operation)))?
    }
}

/// Upload/trigger/poll/download front end over the pipelines.
#[derive(Clone)]
pub struct DocumentService {
    ctx: PipelineContext,
}

impl DocumentService {
    /// Build a service with an in-memory store, the default document adapter
    /// and an `edgequake-llm` provider resolved from `config`.
    pub fn new(config: ServiceConfig) -> Result<Self, DocFixError> {
        let service = LlmService::from_config(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(MemoryJobStore::new()),
            Arc::new(service),
            Arc::new(OfficeAdapter),
        ))
    }

    /// Build a service from explicit collaborators.
    pub fn with_parts(
        config: ServiceConfig,
        store: Arc<dyn JobStore>,
        service: Arc<dyn LanguageService>,
        documents: Arc<dyn DocumentAdapter>,
    ) -> Self {
        Self {
            ctx: PipelineContext {
                store,
                service,
                documents,
                config: Arc::new(config),
            },
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.ctx.store
    }

    /// Validate, extract and chunk an uploaded document, creating its job.
    ///
    /// # Errors
    /// [`DocFixError::UnsupportedFormat`], [`DocFixError::ExtractionFailed`]
    /// or [`DocFixError::EmptyDocument`].
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt, DocFixError> {
        let format = DocumentFormat::detect(filename, &bytes)?;

        let documents = Arc::clone(&self.ctx.documents);
        let paragraphs =
            tokio::task::spawn_blocking(move || documents.extract_paragraphs(format, &bytes))
                .await
                .map_err(|e| DocFixError::Internal(format!("extraction task failed: {e}")))?
                .map_err(|e| with_filename(e, filename))?;

        let chunks = chunk_paragraphs(&paragraphs, self.ctx.config.max_chunk_chars)
            .map_err(|e| with_filename(e, filename))?;

        let file_id = Uuid::new_v4().to_string();
        let job = self
            .ctx
            .store
            .create(NewJob {
                file_id: file_id.clone(),
                original_filename: filename.to_string(),
                format,
                chunks,
            })
            .await?;

        info!(
            "Job {}: uploaded '{}' ({}, {} paragraphs, {} chunks)",
            file_id,
            filename,
            format,
            paragraphs.len(),
            job.chunks.len()
        );

        Ok(UploadReceipt {
            file_id,
            message: format!("File {filename} uploaded successfully"),
            format,
            paragraph_count: paragraphs.len(),
            chunk_count: job.chunks.len(),
        })
    }

    /// Start the compliance pipeline on a background task.
    ///
    /// # Errors
    /// [`DocFixError::NotFound`], or [`DocFixError::InvalidState`] while
    /// another pipeline is running on the job.
    pub async fn start_compliance(&self, file_id: &str) -> Result<JobHandle, DocFixError> {
        self.start(file_id, Operation::Compliance).await
    }

    /// Start the correction pipeline on a background task.
    ///
    /// # Errors
    /// Same as [`DocumentService::start_compliance`].
    pub async fn start_correction(&self, file_id: &str) -> Result<JobHandle, DocFixError> {
        self.start(file_id, Operation::Correction).await
    }

    async fn start(&self, file_id: &str, operation: Operation) -> Result<JobHandle, DocFixError> {
        let job = self.ctx.store.begin(file_id, operation).await?;
        let ctx = self.ctx.clone();

        let guard = ctx.clone();
        let id = file_id.to_string();

        let handle = match operation {
            Operation::Compliance => {
                tokio::spawn(guard.supervise(id, operation, compliance::run(ctx, job)))
            }
            Operation::Correction => {
                tokio::spawn(guard.supervise(id, operation, correction::run(ctx, job)))
            }
        };

        Ok(JobHandle {
            file_id: file_id.to_string(),
            operation,
            handle,
        })
    }

    /// Current status of a job.
    pub async fn status(&self, file_id: &str) -> Result<StatusReport, DocFixError> {
        let job = self.ctx.store.get(file_id).await?;
        let message = status_message(&job);
        Ok(StatusReport {
            file_id: job.file_id,
            status: job.status,
            compliance_reports: job.compliance_reports,
            message,
        })
    }

    /// Full job record, including chunks and corrected text.
    pub async fn job(&self, file_id: &str) -> Result<Job, DocFixError> {
        self.ctx.store.get(file_id).await
    }

    /// The corrected document.
    ///
    /// # Errors
    /// [`DocFixError::NotReady`] unless the job is `correction_complete`;
    /// [`DocFixError::NotFound`] for an unknown id or a missing output file.
    pub async fn download(&self, file_id: &str) -> Result<Download, DocFixError> {
        let job = self.ctx.store.get(file_id).await?;
        if job.status != JobStatus::CorrectionComplete {
            return Err(DocFixError::NotReady {
                file_id: job.file_id,
                status: job.status,
            });
        }

        let not_found = || DocFixError::NotFound {
            file_id: file_id.to_string(),
        };
        let path = job.output_path.as_ref().ok_or_else(not_found)?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(DocFixError::Internal(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )))
            }
        };

        Ok(Download {
            filename: download_name(&job.original_filename),
            bytes,
        })
    }
}

/// Human-readable description of the job's status.
pub fn status_message(job: &Job) -> String {
    if let Some(ref err) = job.error_message {
        return format!("Error: {err}");
    }
    match job.status {
        JobStatus::Uploaded => "File uploaded, ready for compliance checking",
        JobStatus::ProcessingCompliance => "Compliance checking in progress...",
        JobStatus::ComplianceComplete => "Compliance checking complete, ready for correction",
        JobStatus::ProcessingCorrection => "Document correction in progress...",
        JobStatus::CorrectionComplete => "Document correction complete, ready for download",
        JobStatus::Error => "Error: unknown failure",
    }
    .to_string()
}

/// `corrected_<stem>.docx` for an uploaded file name.
pub fn download_name(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("corrected_{stem}.docx")
}

/// Attach the upload's file name to extraction errors raised by the adapter.
fn with_filename(err: DocFixError, filename: &str) -> DocFixError {
    match err {
        DocFixError::ExtractionFailed { detail, .. } => DocFixError::ExtractionFailed {
            filename: filename.to_string(),
            detail,
        },
        DocFixError::EmptyDocument { .. } => DocFixError::EmptyDocument {
            filename: filename.to_string(),
        },
        other => other,
    }
}
