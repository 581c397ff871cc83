//! Writer abstraction trait
//!
//! This module defines the DataWriter trait that all storage backends must
//! implement, together with the sink trait and the error types shared by
//! the backends.

use async_trait::async_trait;
use bytes::Bytes;
use stagehand_core::{StorageBackend, StorageLocation};
use thiserror::Error;

/// Writer operation errors
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer is closed")]
    WriterClosed,

    #[error("Sink for generation {sink} is stale: writer is on generation {current}")]
    SinkClosed { sink: u64, current: u64 },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Empty output rejected: {0}")]
    EmptyOutput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for writer operations
pub type WriterResult<T> = Result<T, WriterError>;

/// Rolling data-writer abstraction
///
/// All storage backends (S3, local filesystem) implement this trait. A
/// writer manages exactly one open output generation at a time: generation
/// 0 is opened at construction, each successful [`roll`](DataWriter::roll)
/// finalizes generation N and opens N+1, and [`close`](DataWriter::close)
/// finalizes whatever is still open and ends the lifecycle.
///
/// A writer instance carries one logical stream. The mutating operations
/// take `&mut self`, so a single producer drives the writer; callers that
/// need parallelism run independent writers on disjoint prefixes.
#[async_trait]
pub trait DataWriter: Send {
    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Location of the generation currently open.
    ///
    /// The returned value is a snapshot: once the writer rolls past this
    /// generation, the object at the location is final and never mutated
    /// again. Stable across calls with no intervening roll; changes only
    /// after a successful roll.
    fn current_location(&self) -> WriterResult<StorageLocation>;

    /// Obtain a write sink bound to the current generation.
    ///
    /// The sink is bound to this generation only: after the next roll it
    /// fails fast with [`WriterError::SinkClosed`] instead of silently
    /// writing to either the old or the new destination.
    fn sink(&self) -> WriterResult<Box<dyn ChunkSink>>;

    /// Durably finalize the current generation and open the next one.
    ///
    /// Finalization means fully flushed and fsynced for local files, and
    /// fully uploaded for object storage: when `roll` returns `Ok`, the
    /// returned location is safe to register externally with nothing left
    /// to await.
    /// On failure the writer remains consistently open on the same
    /// generation with its data intact, so the caller may retry or keep
    /// writing. A zero-byte roll produces an empty object unless the writer
    /// was configured to reject empty outputs, in which case it fails with
    /// [`WriterError::EmptyOutput`].
    async fn roll(&mut self) -> WriterResult<StorageLocation>;

    /// Finalize the still-open generation and end the writer lifecycle.
    ///
    /// Returns the finalized location, or `None` if the backend had nothing
    /// to materialize for the trailing generation. Resources are released
    /// even when finalization fails, but the failure is still reported.
    /// Every operation after `close` (including a second `close`) fails
    /// with [`WriterError::WriterClosed`].
    async fn close(&mut self) -> WriterResult<Option<StorageLocation>>;
}

/// Write sink bound to exactly one output generation.
#[async_trait]
pub trait ChunkSink: Send {
    /// The generation this sink writes to.
    fn generation(&self) -> u64;

    /// Append a chunk to the bound generation's output.
    ///
    /// May suspend while the underlying transport applies backpressure.
    /// Fails with [`WriterError::SinkClosed`] once the writer has rolled
    /// past this sink's generation, and with [`WriterError::WriterClosed`]
    /// once the writer is closed.
    async fn write_chunk(&mut self, chunk: Bytes) -> WriterResult<()>;
}
