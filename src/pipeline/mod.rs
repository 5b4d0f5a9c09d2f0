//! Background pipelines that process a job chunk by chunk.
//!
//! ## Data Flow
//!
//! ```text
//!               ┌──▶ compliance ──▶ report::parse_report ──▶ store.compliance_reports
//! store.chunks ─┤
//!               └──▶ correction ──▶ postprocess ──▶ store.corrected_chunks ──▶ DOCX
//! ```
//!
//! 1. [`llm`]: the [`llm::LanguageService`] seam plus retry/timeout policy
//! 2. [`compliance`]: analyse every chunk and record one report per chunk
//! 3. [`correction`]: correct every chunk, then assemble and persist the DOCX
//! 4. [`postprocess`]: deterministic cleanup of raw model replies
//!
//! Both pipelines send up to `concurrency` chunks to the model at once but
//! commit results strictly in chunk order, and both stop at the first chunk
//! that fails.

pub mod compliance;
pub mod correction;
pub mod llm;
pub mod postprocess;

use crate::config::ServiceConfig;
use crate::document::DocumentAdapter;
use crate::error::DocFixError;
use crate::progress::PipelineProgressCallback;
use crate::store::{JobStore, Operation};
use futures::FutureExt;
use llm::LanguageService;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

/// Collaborators shared by every pipeline run.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn JobStore>,
    pub service: Arc<dyn LanguageService>,
    pub documents: Arc<dyn DocumentAdapter>,
    pub config: Arc<ServiceConfig>,
}

impl PipelineContext {
    /// Invoke the progress callback, if one is configured.
    pub(crate) fn notify(&self, event: impl FnOnce(&dyn PipelineProgressCallback)) {
        if let Some(ref cb) = self.config.progress_callback {
            event(cb.as_ref());
        }
    }

    /// Record the outcome of a run on the job.
    ///
    /// Success moves the job to the operation's complete status; failure
    /// marks it `error` with the failure's message. The outcome is returned
    /// unchanged so the caller's `JobHandle` sees it too.
    pub(crate) async fn finish(
        &self,
        file_id: &str,
        op: Operation,
        total_chunks: usize,
        done: usize,
        outcome: Result<(), DocFixError>,
    ) -> Result<(), DocFixError> {
        let outcome = match outcome {
            Ok(()) => self.store.update_status(file_id, op.complete_status()).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(()) => info!(
                "Job {}: {} complete ({} chunks)",
                file_id, op, total_chunks
            ),
            Err(e) => {
                error!(
                    "Job {}: {} failed after {}/{} chunks: {}",
                    file_id, op, done, total_chunks, e
                );
                if let Err(store_err) = self.store.mark_error(file_id, &e.to_string()).await {
                    error!("Job {}: could not record failure: {}", file_id, store_err);
                }
            }
        }

        self.notify(|cb| cb.on_pipeline_complete(file_id, op, total_chunks, done));
        outcome
    }

    /// Run a pipeline future; a panic marks the job `error` instead of
    /// leaving it in `processing_*`.
    pub(crate) async fn supervise<F>(
        self,
        file_id: String,
        op: Operation,
        run: F,
    ) -> Result<(), DocFixError>
    where
        F: Future<Output = Result<(), DocFixError>>,
    {
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("Job {}: {} task panicked: {}", file_id, op, reason);
                let err = DocFixError::Internal(format!("{op} task panicked: {reason}"));
                if let Err(store_err) = self.store.mark_error(&file_id, &err.to_string()).await {
                    error!("Job {}: could not record failure: {}", file_id, store_err);
                }
                Err(err)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
