use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stagehand_core::{StorageBackend, StorageLocation};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::naming::GenerationNamer;
use crate::traits::{ChunkSink, DataWriter, WriterError, WriterResult};

/// Local filesystem writer implementation
///
/// Writes each generation to its own file under a base directory. The sink
/// appends to the open file handle; `roll` flushes and fsyncs the current
/// file before swapping in the next one, so a finalized generation is
/// immediately readable by other processes.
pub struct LocalDataWriter {
    base_dir: PathBuf,
    namer: GenerationNamer,
    allow_empty: bool,
    generation: u64,
    location: StorageLocation,
    closed: bool,
    state: Arc<Mutex<LocalState>>,
}

enum LocalState {
    Open {
        generation: u64,
        file: File,
        written: u64,
    },
    Closed,
}

/// Write sink bound to one generation of a [`LocalDataWriter`].
pub struct LocalSink {
    generation: u64,
    state: Arc<Mutex<LocalState>>,
}

impl LocalDataWriter {
    /// Create a writer and open generation 0.
    ///
    /// # Arguments
    /// * `base_dir` - Root directory for output files (created if missing)
    /// * `namer` - Generation naming scheme, shared with other backends
    /// * `allow_empty` - Whether a zero-byte generation may be rolled
    pub async fn new(
        base_dir: impl Into<PathBuf>,
        namer: GenerationNamer,
        allow_empty: bool,
    ) -> WriterResult<Self> {
        let base_dir = base_dir.into();

        fs::create_dir_all(&base_dir).await.map_err(|e| {
            WriterError::ConfigError(format!(
                "Failed to create staging directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        let path = base_dir.join(namer.name_for(0));
        let file = Self::create_output(&path).await?;

        tracing::info!(path = %path.display(), "Local writer opened");

        Ok(LocalDataWriter {
            base_dir,
            namer,
            allow_empty,
            generation: 0,
            location: StorageLocation::local(path),
            closed: false,
            state: Arc::new(Mutex::new(LocalState::Open {
                generation: 0,
                file,
                written: 0,
            })),
        })
    }

    fn path_for(&self, generation: u64) -> PathBuf {
        self.base_dir.join(self.namer.name_for(generation))
    }

    /// Ensure the parent directory exists, then create the file.
    async fn create_output(path: &Path) -> WriterResult<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(File::create(path).await?)
    }
}

impl Drop for LocalDataWriter {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                location = %self.location,
                "Local writer dropped without close; current generation was not fsynced"
            );
        }
    }
}

#[async_trait]
impl DataWriter for LocalDataWriter {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn current_location(&self) -> WriterResult<StorageLocation> {
        if self.closed {
            return Err(WriterError::WriterClosed);
        }
        Ok(self.location.clone())
    }

    fn sink(&self) -> WriterResult<Box<dyn ChunkSink>> {
        if self.closed {
            return Err(WriterError::WriterClosed);
        }
        Ok(Box::new(LocalSink {
            generation: self.generation,
            state: self.state.clone(),
        }))
    }

    async fn roll(&mut self) -> WriterResult<StorageLocation> {
        let mut state = self.state.lock().await;
        let LocalState::Open {
            generation,
            file,
            written,
        } = &mut *state
        else {
            return Err(WriterError::WriterClosed);
        };

        if *written == 0 && !self.allow_empty {
            return Err(WriterError::EmptyOutput(format!(
                "refusing to roll zero-byte generation {}",
                generation
            )));
        }

        let start = std::time::Instant::now();
        let size = *written;

        file.flush().await?;
        file.sync_all().await?;

        // Open generation N+1 before dropping the finalized handle, so a
        // failed create leaves generation N open and the state unchanged.
        let next_generation = *generation + 1;
        let next_path = self.path_for(next_generation);
        let next_file = Self::create_output(&next_path).await?;

        *state = LocalState::Open {
            generation: next_generation,
            file: next_file,
            written: 0,
        };
        let finalized = std::mem::replace(&mut self.location, StorageLocation::local(next_path));
        self.generation = next_generation;

        tracing::info!(
            location = %finalized,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local generation finalized"
        );

        Ok(finalized)
    }

    async fn close(&mut self) -> WriterResult<Option<StorageLocation>> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, LocalState::Closed);
        let LocalState::Open {
            mut file, written, ..
        } = previous
        else {
            return Err(WriterError::WriterClosed);
        };
        self.closed = true;
        drop(state);

        let start = std::time::Instant::now();

        // The handle is released no matter what; a failed fsync is still
        // reported to the caller.
        let mut result = Ok(());
        if let Err(e) = file.flush().await {
            result = Err(WriterError::from(e));
        } else if let Err(e) = file.sync_all().await {
            result = Err(WriterError::from(e));
        }
        drop(file);
        result?;

        tracing::info!(
            location = %self.location,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local writer closed"
        );

        Ok(Some(self.location.clone()))
    }
}

#[async_trait]
impl ChunkSink for LocalSink {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> WriterResult<()> {
        let mut state = self.state.lock().await;
        match &mut *state {
            LocalState::Closed => Err(WriterError::WriterClosed),
            LocalState::Open {
                generation,
                file,
                written,
            } => {
                if *generation != self.generation {
                    return Err(WriterError::SinkClosed {
                        sink: self.generation,
                        current: *generation,
                    });
                }
                file.write_all(&chunk).await?;
                *written += chunk.len() as u64;
                Ok(())
            }
        }
    }
}
