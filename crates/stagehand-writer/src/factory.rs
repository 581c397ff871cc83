#[cfg(feature = "storage-local")]
use crate::LocalDataWriter;
#[cfg(feature = "storage-s3")]
use crate::S3DataWriter;
use crate::naming::GenerationNamer;
use crate::traits::{DataWriter, WriterError, WriterResult};
use stagehand_core::{StorageBackend, WriterConfig};

/// Create a data writer based on configuration
pub async fn create_writer(config: &WriterConfig) -> WriterResult<Box<dyn DataWriter>> {
    let backend = config.backend().unwrap_or(StorageBackend::Local);
    let namer = GenerationNamer::new(config.prefix(), config.extension())?;

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config.s3_bucket().map(String::from).ok_or_else(|| {
                WriterError::ConfigError("STAGEHAND_S3_BUCKET not configured".to_string())
            })?;
            let region = config
                .s3_region()
                .map(String::from)
                .or_else(|| config.aws_region().map(String::from))
                .ok_or_else(|| {
                    WriterError::ConfigError(
                        "STAGEHAND_S3_REGION or AWS_REGION not configured".to_string(),
                    )
                })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let writer =
                S3DataWriter::new(bucket, region, endpoint, namer, config.allow_empty())?;
            Ok(Box::new(writer))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(WriterError::ConfigError(
            "S3 backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let dir = config.local_dir().map(String::from).ok_or_else(|| {
                WriterError::ConfigError("STAGEHAND_LOCAL_DIR not configured".to_string())
            })?;

            let writer = LocalDataWriter::new(dir, namer, config.allow_empty()).await?;
            Ok(Box::new(writer))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(WriterError::ConfigError(
            "Local backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
