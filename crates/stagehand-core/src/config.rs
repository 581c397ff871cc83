//! Configuration module
//!
//! Environment-driven configuration for constructing writers. Settings are
//! read from STAGEHAND_* variables (a .env file is honored in development).
//! Required fields are validated by the factory that consumes the config,
//! not here, so partial configs stay usable for the backend they describe.

use std::env;

use crate::storage_types::StorageBackend;

const DEFAULT_PREFIX: &str = "staging";
const DEFAULT_EXTENSION: &str = ".bin";

/// Writer configuration
#[derive(Clone, Debug)]
pub struct WriterConfig {
    pub backend: Option<StorageBackend>,
    // S3 backend settings
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    // Local backend settings
    pub local_dir: Option<String>,
    // Generation naming
    pub prefix: String,
    pub extension: String,
    // Whether a zero-byte generation may roll into an empty object
    pub allow_empty: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            backend: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_dir: None,
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            allow_empty: true,
        }
    }
}

impl WriterConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let backend = env::var("STAGEHAND_BACKEND")
            .ok()
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?;

        Ok(WriterConfig {
            backend,
            s3_bucket: env::var("STAGEHAND_S3_BUCKET").ok(),
            s3_region: env::var("STAGEHAND_S3_REGION").ok(),
            s3_endpoint: env::var("STAGEHAND_S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_dir: env::var("STAGEHAND_LOCAL_DIR").ok(),
            prefix: env::var("STAGEHAND_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
            extension: env::var("STAGEHAND_EXTENSION")
                .unwrap_or_else(|_| DEFAULT_EXTENSION.to_string()),
            allow_empty: env::var("STAGEHAND_ALLOW_EMPTY")
                .map(|s| s.to_lowercase().parse().unwrap_or(true))
                .unwrap_or(true),
        })
    }

    // Convenience getters for common fields
    pub fn backend(&self) -> Option<StorageBackend> {
        self.backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.aws_region.as_deref()
    }

    pub fn local_dir(&self) -> Option<&str> {
        self.local_dir.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }
}
