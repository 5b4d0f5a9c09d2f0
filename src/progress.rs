//! Progress-callback trait for per-chunk pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to receive
//! events as the compliance and correction pipelines process each chunk.
//!
//! Events are keyed by file id, so one callback can observe every job the
//! service runs.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docfix::{PipelineProgressCallback, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, file_id: &str, chunk_index: usize, total_chunks: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{file_id}: chunk {}/{} done ({done} so far)", chunk_index + 1, total_chunks);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::store::Operation;
use std::sync::Arc;

/// Called by the pipelines as they process each chunk.
///
/// Up to `concurrency` chunks are in flight at once, so `on_chunk_start` may
/// be called concurrently from different tasks. `on_chunk_complete` is called
/// in chunk order, right after the result is committed to the store.
///
/// All methods have no-op defaults.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first chunk is sent to the model.
    fn on_pipeline_start(&self, file_id: &str, op: Operation, total_chunks: usize) {
        let _ = (file_id, op, total_chunks);
    }

    /// Called just before the model request for a chunk (0-indexed).
    fn on_chunk_start(&self, file_id: &str, chunk_index: usize, total_chunks: usize) {
        let _ = (file_id, chunk_index, total_chunks);
    }

    /// Called once the chunk's result has been committed.
    fn on_chunk_complete(&self, file_id: &str, chunk_index: usize, total_chunks: usize) {
        let _ = (file_id, chunk_index, total_chunks);
    }

    /// Called when a chunk fails after all retries. The pipeline stops after
    /// the first such failure.
    fn on_chunk_error(&self, file_id: &str, chunk_index: usize, total_chunks: usize, error: &str) {
        let _ = (file_id, chunk_index, total_chunks, error);
    }

    /// Called once when the pipeline ends, successfully or not.
    ///
    /// * `success_count`: chunks committed before the pipeline ended
    fn on_pipeline_complete(
        &self,
        file_id: &str,
        op: Operation,
        total_chunks: usize,
        success_count: usize,
    ) {
        let _ = (file_id, op, total_chunks, success_count);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
