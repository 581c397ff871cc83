//! Storage location model: backend-specific reference to where one output
//! generation lives.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

/// An immutable reference to the physical location of one output generation.
///
/// Locations are plain values: equality and hashing are field-by-field, and
/// a location handed out by a writer is a snapshot that never changes
/// underfoot. Once the writer rolls past the generation a location refers
/// to, the object at that location is final and will not be touched by the
/// writer again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageLocation {
    /// A file on the local filesystem.
    Local { path: PathBuf },
    /// An object in an S3-compatible bucket.
    S3 { bucket: String, key: String },
}

impl StorageLocation {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        StorageLocation::Local { path: path.into() }
    }

    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        StorageLocation::S3 {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            StorageLocation::Local { .. } => StorageBackend::Local,
            StorageLocation::S3 { .. } => StorageBackend::S3,
        }
    }
}

impl Display for StorageLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageLocation::Local { path } => write!(f, "{}", path.display()),
            StorageLocation::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_value_based() {
        let a = StorageLocation::s3("bucket", "staging/part-00000000.bin");
        let b = StorageLocation::s3("bucket", "staging/part-00000000.bin");
        let c = StorageLocation::s3("bucket", "staging/part-00000001.bin");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, StorageLocation::local("staging/part-00000000.bin"));
    }

    #[test]
    fn test_display() {
        let loc = StorageLocation::s3("exports", "daily/part-00000003.jsonl");
        assert_eq!(loc.to_string(), "s3://exports/daily/part-00000003.jsonl");
        assert_eq!(loc.backend(), StorageBackend::S3);

        let loc = StorageLocation::local("/var/lib/stagehand/part-00000000.bin");
        assert_eq!(loc.to_string(), "/var/lib/stagehand/part-00000000.bin");
        assert_eq!(loc.backend(), StorageBackend::Local);
    }

    #[test]
    fn test_serialize_tags_backend() {
        let loc = StorageLocation::s3("exports", "daily/part-00000000.bin");
        let json = serde_json::to_string(&loc).unwrap();
        assert!(json.contains("\"backend\":\"s3\""));
        assert!(json.contains("\"bucket\":\"exports\""));
    }
}
