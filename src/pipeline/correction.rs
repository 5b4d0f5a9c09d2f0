//! Correction pipeline: rewrite every chunk, then reassemble a DOCX.
//!
//! `processing_correction → correction_complete | error`
//!
//! A corrected chunk must keep its paragraph count so the output document has
//! exactly as many paragraphs as the source. When the model merges or splits
//! paragraphs, the chunk's original paragraphs are kept instead and the chunk
//! is flagged as a fallback; this does not fail the job.

use super::llm::call_with_retry;
use super::postprocess::clean_reply;
use super::PipelineContext;
use crate::chunker::{split_paragraphs, Chunk};
use crate::error::DocFixError;
use crate::report::CorrectedChunk;
use crate::store::{Job, Operation};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the corrected document for `file_id`.
pub fn output_file_name(file_id: &str) -> String {
    format!("corrected_{file_id}.docx")
}

/// Correct every chunk of `job`, then write the corrected document to
/// `<output_dir>/corrected_<file_id>.docx`.
///
/// `job` must already be in `processing_correction`. On return the job is
/// either `correction_complete` with `output_path` set, or `error`.
pub async fn run(ctx: PipelineContext, job: Job) -> Result<(), DocFixError> {
    let file_id = job.file_id.as_str();
    let total = job.chunks.len();
    info!(
        "Job {}: correcting {} chunks (concurrency {})",
        file_id, total, ctx.config.concurrency
    );
    ctx.notify(|cb| cb.on_pipeline_start(file_id, Operation::Correction, total));

    let mut done = 0;
    let outcome = match correct_chunks(&ctx, &job, &mut done).await {
        Ok(()) => assemble(&ctx, file_id).await,
        Err(e) => Err(e),
    };
    ctx.finish(file_id, Operation::Correction, total, done, outcome)
        .await
}

async fn correct_chunks(
    ctx: &PipelineContext,
    job: &Job,
    done: &mut usize,
) -> Result<(), DocFixError> {
    let file_id = job.file_id.as_str();
    let total = job.chunks.len();

    let work = job.chunks.clone();

    let mut results = stream::iter(work.into_iter().map(|chunk| {
        let service = Arc::clone(&ctx.service);
        let config = Arc::clone(&ctx.config);
        let file_id = file_id.to_string();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_start(&file_id, chunk.index, total);
            }
            let text = chunk.text();
            let outcome = call_with_retry(chunk.index, &config, || service.correct(&text)).await;
            (chunk, outcome)
        }
    }))
    .buffered(ctx.config.concurrency);

    while let Some((chunk, outcome)) = results.next().await {
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                ctx.notify(|cb| cb.on_chunk_error(file_id, chunk.index, total, &e.to_string()));
                return Err(e.into());
            }
        };

        let corrected = align_paragraphs(file_id, &chunk, &reply);
        debug!(
            "Job {}: chunk {}/{} corrected{}",
            file_id,
            chunk.index + 1,
            total,
            if corrected.fallback { " (kept original)" } else { "" }
        );

        ctx.store
            .append_corrected_chunk(file_id, chunk.index, corrected)
            .await?;
        *done += 1;
        ctx.notify(|cb| cb.on_chunk_complete(file_id, chunk.index, total));
    }

    Ok(())
}

/// Map a model reply back onto the chunk's paragraphs.
///
/// Falls back to the original paragraphs when the paragraph count differs.
pub fn align_paragraphs(file_id: &str, chunk: &Chunk, reply: &str) -> CorrectedChunk {
    let paragraphs = split_paragraphs(&clean_reply(reply));

    if paragraphs.len() == chunk.paragraph_count() {
        return CorrectedChunk {
            chunk_index: chunk.index,
            paragraphs,
            fallback: false,
        };
    }

    warn!(
        "Job {}: chunk {} came back with {} paragraph(s) instead of {}; keeping original text",
        file_id,
        chunk.index,
        paragraphs.len(),
        chunk.paragraph_count()
    );
    CorrectedChunk {
        chunk_index: chunk.index,
        paragraphs: chunk.paragraphs.clone(),
        fallback: true,
    }
}

/// Flatten the corrected chunks, render the DOCX and persist it.
async fn assemble(ctx: &PipelineContext, file_id: &str) -> Result<(), DocFixError> {
    let job = ctx.store.get(file_id).await?;
    let paragraphs: Vec<String> = job
        .corrected_chunks
        .into_iter()
        .flat_map(|c| c.paragraphs)
        .collect();
    let paragraph_count = paragraphs.len();

    let documents = Arc::clone(&ctx.documents);
    let bytes = tokio::task::spawn_blocking(move || documents.write_document(&paragraphs))
        .await
        .map_err(|e| DocFixError::Internal(format!("document writer task failed: {e}")))??;

    let path = persist(&ctx.config.output_dir, file_id, &bytes).await?;
    info!(
        "Job {}: wrote {} paragraphs ({} bytes) to {}",
        file_id,
        paragraph_count,
        bytes.len(),
        path.display()
    );
    ctx.store.set_output_path(file_id, path).await
}

/// Write `bytes` to `<dir>/corrected_<file_id>.docx` via a temp file and rename,
/// so readers never see a partial document.
async fn persist(dir: &Path, file_id: &str, bytes: &[u8]) -> Result<PathBuf, DocFixError> {
    let failed = |what: &str, path: &Path, e: std::io::Error| DocFixError::AssemblyFailure {
        detail: format!("failed to {what} '{}': {e}", path.display()),
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| failed("create output directory", dir, e))?;

    let path = dir.join(output_file_name(file_id));
    let tmp = dir.join(format!(".{}.tmp", output_file_name(file_id)));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| failed("write", &tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(failed("move into place", &path, e));
    }
    Ok(path)
}
