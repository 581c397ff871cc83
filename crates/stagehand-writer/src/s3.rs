use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use stagehand_core::{StorageBackend, StorageLocation};
use tokio::sync::Mutex;

use crate::naming::GenerationNamer;
use crate::traits::{ChunkSink, DataWriter, WriterError, WriterResult};

/// S3 writer implementation
///
/// Remote object stores have no append, so the sink buffers chunks in
/// memory and the object for a generation materializes only when `roll`
/// (or `close`) uploads the whole buffer in a single atomic put under the
/// generation's key. A failed upload surfaces to the caller with the
/// buffer unconsumed; retrying is the caller's (and the underlying
/// client's) responsibility.
pub struct S3DataWriter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    namer: GenerationNamer,
    allow_empty: bool,
    generation: u64,
    location: StorageLocation,
    closed: bool,
    state: Arc<Mutex<S3State>>,
}

enum S3State {
    Open { generation: u64, buffer: Vec<u8> },
    Closed,
}

/// Write sink bound to one generation of an [`S3DataWriter`].
pub struct S3Sink {
    generation: u64,
    state: Arc<Mutex<S3State>>,
}

impl S3DataWriter {
    /// Create a writer against AWS S3 (or an S3-compatible provider) and
    /// open generation 0.
    ///
    /// Credentials are resolved from the environment by the underlying
    /// client.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `namer` - Generation naming scheme, shared with other backends
    /// * `allow_empty` - Whether a zero-byte generation may be rolled
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        namer: GenerationNamer,
        allow_empty: bool,
    ) -> WriterResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| WriterError::ConfigError(e.to_string()))?;

        Ok(Self::with_store(Arc::new(store), bucket, namer, allow_empty))
    }

    /// Create a writer over an already-built object store.
    ///
    /// This is the seam for alternative [`ObjectStore`] implementations
    /// (and for tests, which use an in-memory store).
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        namer: GenerationNamer,
        allow_empty: bool,
    ) -> Self {
        let bucket = bucket.into();
        let location = StorageLocation::s3(bucket.clone(), namer.name_for(0));

        tracing::info!(bucket = %bucket, key = %namer.name_for(0), "S3 writer opened");

        S3DataWriter {
            store,
            bucket,
            namer,
            allow_empty,
            generation: 0,
            location,
            closed: false,
            state: Arc::new(Mutex::new(S3State::Open {
                generation: 0,
                buffer: Vec::new(),
            })),
        }
    }

    fn key_for(&self, generation: u64) -> String {
        self.namer.name_for(generation)
    }

    /// Upload one generation's buffer under its key.
    async fn upload(&self, key: &str, buffer: &[u8]) -> WriterResult<()> {
        let size = buffer.len() as u64;
        let path = ObjectPath::from(key.to_string());
        let start = std::time::Instant::now();

        self.store
            .put(&path, PutPayload::from(Bytes::copy_from_slice(buffer)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 generation upload failed"
                );
                WriterError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 generation uploaded"
        );

        Ok(())
    }
}

impl Drop for S3DataWriter {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                location = %self.location,
                "S3 writer dropped without close; buffered bytes for the current generation were discarded"
            );
        }
    }
}

#[async_trait]
impl DataWriter for S3DataWriter {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
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
        Ok(Box::new(S3Sink {
            generation: self.generation,
            state: self.state.clone(),
        }))
    }

    async fn roll(&mut self) -> WriterResult<StorageLocation> {
        let mut state = self.state.lock().await;
        let S3State::Open { generation, buffer } = &mut *state else {
            return Err(WriterError::WriterClosed);
        };

        if buffer.is_empty() && !self.allow_empty {
            return Err(WriterError::EmptyOutput(format!(
                "refusing to roll zero-byte generation {}",
                generation
            )));
        }

        // Phase 1: materialize generation N. The buffer stays intact until
        // the put succeeds, so a failed roll can be retried without data
        // loss.
        let key = self.key_for(*generation);
        self.upload(&key, buffer).await?;

        // Phase 2: fresh buffer and key for generation N+1.
        let next_generation = *generation + 1;
        *state = S3State::Open {
            generation: next_generation,
            buffer: Vec::new(),
        };
        let next_location = StorageLocation::s3(self.bucket.clone(), self.key_for(next_generation));
        let finalized = std::mem::replace(&mut self.location, next_location);
        self.generation = next_generation;

        Ok(finalized)
    }

    async fn close(&mut self) -> WriterResult<Option<StorageLocation>> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, S3State::Closed);
        let S3State::Open { generation, buffer } = previous else {
            return Err(WriterError::WriterClosed);
        };
        self.closed = true;
        drop(state);

        // An empty trailing buffer materializes no object.
        if buffer.is_empty() {
            tracing::info!(bucket = %self.bucket, "S3 writer closed with no trailing output");
            return Ok(None);
        }

        let key = self.key_for(generation);
        self.upload(&key, &buffer).await?;

        Ok(Some(self.location.clone()))
    }
}

#[async_trait]
impl ChunkSink for S3Sink {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> WriterResult<()> {
        let mut state = self.state.lock().await;
        match &mut *state {
            S3State::Closed => Err(WriterError::WriterClosed),
            S3State::Open { generation, buffer } => {
                if *generation != self.generation {
                    return Err(WriterError::SinkClosed {
                        sink: self.generation,
                        current: *generation,
                    });
                }
                buffer.extend_from_slice(&chunk);
                Ok(())
            }
        }
    }
}

#[cfg(all(test, feature = "storage-s3"))]
mod tests {
    use super::*;
    use futures::stream::BoxStream;
    use object_store::memory::InMemory;
    use object_store::{
        GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, PutMultipartOpts,
        PutOptions, PutResult,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_writer(store: Arc<dyn ObjectStore>) -> S3DataWriter {
        let namer = GenerationNamer::new("staging", ".bin").unwrap();
        S3DataWriter::with_store(store, "test-bucket", namer, true)
    }

    fn key_of(location: &StorageLocation) -> &str {
        match location {
            StorageLocation::S3 { key, .. } => key,
            other => panic!("expected s3 location, got {}", other),
        }
    }

    async fn object_bytes(store: &dyn ObjectStore, key: &str) -> Vec<u8> {
        store
            .get(&ObjectPath::from(key.to_string()))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap()
            .to_vec()
    }

    /// Object store wrapper that fails the first N puts, then delegates.
    #[derive(Debug)]
    struct FlakyStore {
        inner: InMemory,
        failures_left: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(times: usize) -> Self {
            FlakyStore {
                inner: InMemory::new(),
                failures_left: AtomicUsize::new(times),
            }
        }
    }

    impl std::fmt::Display for FlakyStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "FlakyStore({})", self.inner)
        }
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn put_opts(
            &self,
            location: &ObjectPath,
            payload: PutPayload,
            opts: PutOptions,
        ) -> object_store::Result<PutResult> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(object_store::Error::Generic {
                    store: "FlakyStore",
                    source: "injected put failure".into(),
                });
            }
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &ObjectPath,
            opts: PutMultipartOpts,
        ) -> object_store::Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(
            &self,
            location: &ObjectPath,
            options: GetOptions,
        ) -> object_store::Result<GetResult> {
            self.inner.get_opts(location, options).await
        }

        fn list(
            &self,
            prefix: Option<&ObjectPath>,
        ) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
            self.inner.list(prefix)
        }

        async fn list_with_delimiter(
            &self,
            prefix: Option<&ObjectPath>,
        ) -> object_store::Result<ListResult> {
            self.inner.list_with_delimiter(prefix).await
        }

        fn delete_stream<'a>(
            &'a self,
            locations: BoxStream<'static, object_store::Result<ObjectPath>>,
        ) -> BoxStream<'static, object_store::Result<ObjectPath>> {
            self.inner.delete_stream(locations)
        }

        async fn copy_opts(
            &self,
            from: &ObjectPath,
            to: &ObjectPath,
            options: object_store::CopyOptions,
        ) -> object_store::Result<()> {
            self.inner.copy_opts(from, to, options).await
        }
    }

    #[tokio::test]
    async fn test_object_materializes_only_on_roll() {
        let store = Arc::new(InMemory::new());
        let mut writer = test_writer(store.clone());

        let l0 = writer.current_location().unwrap();
        let mut sink = writer.sink().unwrap();
        sink.write_chunk(Bytes::from_static(b"hello ")).await.unwrap();
        sink.write_chunk(Bytes::from_static(b"world")).await.unwrap();

        // Nothing is uploaded while the generation is open.
        let missing = store
            .get(&ObjectPath::from(key_of(&l0).to_string()))
            .await;
        assert!(matches!(missing, Err(object_store::Error::NotFound { .. })));

        let finalized = writer.roll().await.unwrap();
        assert_eq!(finalized, l0);
        assert_eq!(
            object_bytes(store.as_ref(), key_of(&finalized)).await,
            b"hello world"
        );
    }

    #[tokio::test]
    async fn test_scenario_roll_then_close() {
        let store = Arc::new(InMemory::new());
        let mut writer = test_writer(store.clone());

        let mut sink = writer.sink().unwrap();
        for chunk in ["a", "b", "c"] {
            sink.write_chunk(Bytes::copy_from_slice(chunk.as_bytes()))
                .await
                .unwrap();
        }
        let l1 = writer.roll().await.unwrap();

        let mut sink = writer.sink().unwrap();
        sink.write_chunk(Bytes::from_static(b"d")).await.unwrap();
        let l2 = writer.close().await.unwrap().expect("trailing output");

        assert_ne!(l1, l2);
        assert_eq!(object_bytes(store.as_ref(), key_of(&l1)).await, b"abc");
        assert_eq!(object_bytes(store.as_ref(), key_of(&l2)).await, b"d");
    }

    #[tokio::test]
    async fn test_failed_roll_loses_no_data() {
        let store = Arc::new(FlakyStore::failing(1));
        let mut writer = test_writer(store.clone());

        let before = writer.current_location().unwrap();
        let mut sink = writer.sink().unwrap();
        sink.write_chunk(Bytes::from_static(b"abc")).await.unwrap();

        assert!(matches!(
            writer.roll().await,
            Err(WriterError::UploadFailed(_))
        ));
        // The writer is still open on the same generation, buffer intact.
        assert_eq!(writer.current_location().unwrap(), before);
        sink.write_chunk(Bytes::from_static(b"d")).await.unwrap();

        let finalized = writer.roll().await.unwrap();
        assert_eq!(finalized, before);
        assert_eq!(
            object_bytes(&store.inner, key_of(&finalized)).await,
            b"abcd"
        );
    }

    #[tokio::test]
    async fn test_close_with_empty_buffer_materializes_nothing() {
        let store = Arc::new(InMemory::new());
        let mut writer = test_writer(store.clone());
        let l0 = writer.current_location().unwrap();

        assert!(writer.close().await.unwrap().is_none());
        let missing = store
            .get(&ObjectPath::from(key_of(&l0).to_string()))
            .await;
        assert!(matches!(missing, Err(object_store::Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_roll_policy() {
        let store = Arc::new(InMemory::new());
        let mut writer = test_writer(store.clone());
        let empty = writer.roll().await.unwrap();
        assert_eq!(object_bytes(store.as_ref(), key_of(&empty)).await, b"");

        let namer = GenerationNamer::new("staging", ".bin").unwrap();
        let mut strict = S3DataWriter::with_store(store, "test-bucket", namer, false);
        assert!(matches!(
            strict.roll().await,
            Err(WriterError::EmptyOutput(_))
        ));
        strict.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_generation_keys_and_stale_sinks() {
        let store = Arc::new(InMemory::new());
        let mut writer = test_writer(store);

        let mut sink = writer.sink().unwrap();
        assert_eq!(sink.generation(), 0);

        let l0 = writer.roll().await.unwrap();
        let l1 = writer.roll().await.unwrap();
        assert_eq!(key_of(&l0), "staging/part-00000000.bin");
        assert_eq!(key_of(&l1), "staging/part-00000001.bin");
        assert_eq!(
            key_of(&writer.current_location().unwrap()),
            "staging/part-00000002.bin"
        );

        assert!(matches!(
            sink.write_chunk(Bytes::from_static(b"late")).await,
            Err(WriterError::SinkClosed { sink: 0, current: 2 })
        ));

        writer.close().await.unwrap();
        assert!(matches!(
            sink.write_chunk(Bytes::from_static(b"x")).await,
            Err(WriterError::WriterClosed)
        ));
    }
}
