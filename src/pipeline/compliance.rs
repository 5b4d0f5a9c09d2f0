//! Compliance pipeline: one [`ComplianceReport`] per chunk.
//!
//! `processing_compliance → compliance_complete | error`

use super::llm::call_with_retry;
use super::PipelineContext;
use crate::error::DocFixError;
use crate::report::ComplianceReport;
use crate::store::{Job, Operation};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Analyse every chunk of `job` and record the reports in chunk order.
///
/// `job` must already be in `processing_compliance` (see
/// [`crate::store::JobStore::begin`]). On return the job is either
/// `compliance_complete` or `error`.
pub async fn run(ctx: PipelineContext, job: Job) -> Result<(), DocFixError> {
    let file_id = job.file_id.as_str();
    let total = job.chunks.len();
    info!(
        "Job {}: checking compliance of {} chunks (concurrency {})",
        file_id, total, ctx.config.concurrency
    );
    ctx.notify(|cb| cb.on_pipeline_start(file_id, Operation::Compliance, total));

    let mut done = 0;
    let outcome = analyse_chunks(&ctx, &job, &mut done).await;
    ctx.finish(file_id, Operation::Compliance, total, done, outcome)
        .await
}

async fn analyse_chunks(
    ctx: &PipelineContext,
    job: &Job,
    done: &mut usize,
) -> Result<(), DocFixError> {
    let file_id = job.file_id.as_str();
    let total = job.chunks.len();

    let work: Vec<(usize, String)> = job.chunks.iter().map(|c| (c.index, c.text())).collect();

    let mut results = stream::iter(work.into_iter().map(|(index, text)| {
        let service = Arc::clone(&ctx.service);
        let config = Arc::clone(&ctx.config);
        let file_id = file_id.to_string();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_start(&file_id, index, total);
            }
            let outcome = call_with_retry(index, &config, || service.analyze(&text)).await;
            (index, outcome)
        }
    }))
    .buffered(ctx.config.concurrency);

    while let Some((index, outcome)) = results.next().await {
        let report: ComplianceReport = match outcome {
            Ok(report) => report,
            Err(e) => {
                ctx.notify(|cb| cb.on_chunk_error(file_id, index, total, &e.to_string()));
                return Err(e.into());
            }
        };
        debug!(
            "Job {}: chunk {}/{} analysed, {} issue(s)",
            file_id,
            index + 1,
            total,
            report.issues.len()
        );

        ctx.store
            .append_compliance_report(file_id, index, report)
            .await?;
        *done += 1;
        ctx.notify(|cb| cb.on_chunk_complete(file_id, index, total));
    }

    Ok(())
}
