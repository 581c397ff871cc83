//! Stagehand Writer Library
//!
//! This crate provides the rolling data-writer abstraction and its storage
//! backends. A [`DataWriter`] owns exactly one open output generation at a
//! time; a producer pushes byte chunks through a [`ChunkSink`] and calls
//! [`DataWriter::roll`] at its chunk/size/time boundaries to durably
//! finalize the current generation and open the next one. The location of
//! each finalized generation is handed to a downstream committer.
//!
//! # Generation naming
//!
//! Generations are named `{prefix}/part-{generation:08}{extension}`,
//! relative to the backend's root (a base directory, or a bucket). Naming
//! is centralized in the `naming` module so local paths and object keys
//! stay consistent across backends.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod naming;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_writer;
#[cfg(feature = "storage-local")]
pub use local::LocalDataWriter;
pub use naming::GenerationNamer;
#[cfg(feature = "storage-s3")]
pub use s3::S3DataWriter;
pub use stagehand_core::{StorageBackend, StorageLocation, WriterConfig};
pub use traits::{ChunkSink, DataWriter, WriterError, WriterResult};
