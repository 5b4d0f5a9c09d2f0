//! Job state store.
//!
//! A [`Job`] is created at upload and then mutated only by the pipeline that
//! is currently running on it. The store owns the job state machine:
//!
//! ```text
//!                  ┌──────────────────────────── error ◄─────────────┐
//!                  ▼                                                 │
//! uploaded ─► processing_compliance ─► compliance_complete          │
//!     │                                     │                        │
//!     └──────────► processing_correction ◄──┘ ─► correction_complete │
//!                          └─────────────────────────────────────────┘
//! ```
//!
//! Every mutation is validated here, not by callers: results are appended in
//! strict chunk order, a `*_complete` status is refused until every chunk has
//! a result, and [`JobStore::begin`] refuses to start a pipeline while another
//! is in flight.

use crate::chunker::Chunk;
use crate::document::DocumentFormat;
use crate::error::DocFixError;
use crate::report::{ComplianceReport, CorrectedChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    ProcessingCompliance,
    ComplianceComplete,
    ProcessingCorrection,
    CorrectionComplete,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::ProcessingCompliance => "processing_compliance",
            JobStatus::ComplianceComplete => "compliance_complete",
            JobStatus::ProcessingCorrection => "processing_correction",
            JobStatus::CorrectionComplete => "correction_complete",
            JobStatus::Error => "error",
        }
    }

    /// `true` while a pipeline owns the job.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            JobStatus::ProcessingCompliance | JobStatus::ProcessingCorrection
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Completion is additionally gated on the job's results; see
    /// [`JobStore::update_status`].
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match next {
            ProcessingCompliance => !self.is_processing(),
            ProcessingCorrection => {
                matches!(self, Uploaded | ComplianceComplete | CorrectionComplete | Error)
            }
            ComplianceComplete => *self == ProcessingCompliance,
            CorrectionComplete => *self == ProcessingCorrection,
            Error => true,
            Uploaded => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline that can be started on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Compliance,
    Correction,
}

impl Operation {
    /// Status the job holds while this operation runs.
    pub fn processing_status(&self) -> JobStatus {
        match self {
            Operation::Compliance => JobStatus::ProcessingCompliance,
            Operation::Correction => JobStatus::ProcessingCorrection,
        }
    }

    /// Status the job reaches when this operation finishes.
    pub fn complete_status(&self) -> JobStatus {
        match self {
            Operation::Compliance => JobStatus::ComplianceComplete,
            Operation::Correction => JobStatus::CorrectionComplete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Compliance => f.write_str("compliance"),
            Operation::Correction => f.write_str("correction"),
        }
    }
}

/// Everything known about one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub file_id: String,
    pub status: JobStatus,
    pub original_filename: String,
    pub format: DocumentFormat,
    /// Immutable after upload; never empty.
    pub chunks: Vec<Chunk>,
    pub compliance_reports: Vec<ComplianceReport>,
    pub corrected_chunks: Vec<CorrectedChunk>,
    /// Set only while `status == error`.
    pub error_message: Option<String>,
    /// Set once the corrected document has been written.
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid_state(&self, detail: impl Into<String>) -> DocFixError {
        DocFixError::InvalidState {
            file_id: self.file_id.clone(),
            status: self.status,
            detail: detail.into(),
        }
    }
}

/// Input to [`JobStore::create`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub file_id: String,
    pub original_filename: String,
    pub format: DocumentFormat,
    pub chunks: Vec<Chunk>,
}

impl NewJob {
    fn into_job(self) -> Job {
        let now = Utc::now();
        Job {
            file_id: self.file_id,
            status: JobStatus::Uploaded,
            original_filename: self.original_filename,
            format: self.format,
            chunks: self.chunks,
            compliance_reports: Vec::new(),
            corrected_chunks: Vec::new(),
            error_message: None,
            output_path: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage for job state.
///
/// Implementations must serialise mutations per job and reject every
/// transition the state machine does not allow.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in `uploaded` status.
    async fn create(&self, job: NewJob) -> Result<Job, DocFixError>;

    /// Snapshot of the job.
    async fn get(&self, file_id: &str) -> Result<Job, DocFixError>;

    /// Atomically claim the job for `op`.
    ///
    /// Moves the job to the operation's processing status, clears the
    /// operation's previous results and any error message. Rejected with
    /// [`DocFixError::InvalidState`] while a pipeline is in flight.
    async fn begin(&self, file_id: &str, op: Operation) -> Result<Job, DocFixError>;

    async fn update_status(&self, file_id: &str, status: JobStatus) -> Result<(), DocFixError>;

    /// Append the report for chunk `index`; exactly `index` reports must exist.
    async fn append_compliance_report(
        &self,
        file_id: &str,
        index: usize,
        report: ComplianceReport,
    ) -> Result<(), DocFixError>;

    /// Append the corrected chunk `index`; exactly `index` entries must exist.
    async fn append_corrected_chunk(
        &self,
        file_id: &str,
        index: usize,
        chunk: CorrectedChunk,
    ) -> Result<(), DocFixError>;

    async fn set_output_path(&self, file_id: &str, path: PathBuf) -> Result<(), DocFixError>;

    /// Move the job to `error`, recording `message`. Results accumulated by
    /// the failing run are discarded.
    async fn mark_error(&self, file_id: &str, message: &str) -> Result<(), DocFixError>;
}

/// In-memory [`JobStore`]. State is lost when the process exits.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Arc<Mutex<Job>>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn entry(&self, file_id: &str) -> Result<Arc<Mutex<Job>>, DocFixError> {
        self.jobs
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| DocFixError::NotFound {
                file_id: file_id.to_string(),
            })
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Job, DocFixError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.file_id) {
            return Err(DocFixError::DuplicateJob {
                file_id: job.file_id,
            });
        }
        let job = job.into_job();
        jobs.insert(job.file_id.clone(), Arc::new(Mutex::new(job.clone())));
        Ok(job)
    }

    async fn get(&self, file_id: &str) -> Result<Job, DocFixError> {
        let entry = self.entry(file_id).await?;
        let job = entry.lock().await;
        Ok(job.clone())
    }

    async fn begin(&self, file_id: &str, op: Operation) -> Result<Job, DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        let next = op.processing_status();
        if !job.status.can_transition_to(next) {
            let detail = if job.status.is_processing() {
                "another operation is already in progress".to_string()
            } else {
                format!("cannot start {op} from this state")
            };
            return Err(job.invalid_state(detail));
        }

        match op {
            Operation::Compliance => job.compliance_reports.clear(),
            Operation::Correction => {
                job.corrected_chunks.clear();
                job.output_path = None;
            }
        }
        job.error_message = None;
        job.status = next;
        job.touch();
        Ok(job.clone())
    }

    async fn update_status(&self, file_id: &str, status: JobStatus) -> Result<(), DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        if !job.status.can_transition_to(status) {
            return Err(job.invalid_state(format!("cannot move to {status}")));
        }

        let done = match status {
            JobStatus::ComplianceComplete => job.compliance_reports.len(),
            JobStatus::CorrectionComplete => job.corrected_chunks.len(),
            _ => job.chunks.len(),
        };
        if done < job.chunks.len() {
            return Err(job.invalid_state(format!(
                "cannot move to {status}: {done} of {} chunks processed",
                job.chunks.len()
            )));
        }

        job.status = status;
        if status != JobStatus::Error {
            job.error_message = None;
        }
        job.touch();
        Ok(())
    }

    async fn append_compliance_report(
        &self,
        file_id: &str,
        index: usize,
        report: ComplianceReport,
    ) -> Result<(), DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        if job.status != JobStatus::ProcessingCompliance {
            return Err(job.invalid_state("compliance reports can only be added while checking"));
        }
        check_append_index(&job, index, job.compliance_reports.len())?;

        job.compliance_reports.push(ComplianceReport {
            chunk_index: index,
            ..report
        });
        job.touch();
        Ok(())
    }

    async fn append_corrected_chunk(
        &self,
        file_id: &str,
        index: usize,
        chunk: CorrectedChunk,
    ) -> Result<(), DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        if job.status != JobStatus::ProcessingCorrection {
            return Err(job.invalid_state("corrected chunks can only be added while correcting"));
        }
        check_append_index(&job, index, job.corrected_chunks.len())?;

        job.corrected_chunks.push(CorrectedChunk {
            chunk_index: index,
            ..chunk
        });
        job.touch();
        Ok(())
    }

    async fn set_output_path(&self, file_id: &str, path: PathBuf) -> Result<(), DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        if job.status != JobStatus::ProcessingCorrection {
            return Err(job.invalid_state("output can only be recorded while correcting"));
        }
        job.output_path = Some(path);
        job.touch();
        Ok(())
    }

    async fn mark_error(&self, file_id: &str, message: &str) -> Result<(), DocFixError> {
        let entry = self.entry(file_id).await?;
        let mut job = entry.lock().await;

        // A failed run publishes none of its results.
        match job.status {
            JobStatus::ProcessingCompliance => job.compliance_reports.clear(),
            JobStatus::ProcessingCorrection => {
                job.corrected_chunks.clear();
                job.output_path = None;
            }
            _ => {}
        }
        job.status = JobStatus::Error;
        job.error_message = Some(message.to_string());
        job.touch();
        Ok(())
    }
}

fn check_append_index(job: &Job, index: usize, existing: usize) -> Result<(), DocFixError> {
    if index >= job.chunks.len() {
        return Err(job.invalid_state(format!(
            "chunk index {index} out of range ({} chunks)",
            job.chunks.len()
        )));
    }
    if index != existing {
        return Err(job.invalid_state(format!(
            "out-of-order result: expected chunk {existing}, got {index}"
        )));
    }
    Ok(())
}
