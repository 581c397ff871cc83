//! Shared generation naming for storage backends.
//!
//! Name format: `{prefix}/part-{generation:08}{extension}`, relative to the
//! backend's root. Both backends use this module so local paths and object
//! keys stay consistent.

use crate::traits::{WriterError, WriterResult};

/// Derives the name of each output generation.
#[derive(Debug, Clone)]
pub struct GenerationNamer {
    prefix: String,
    extension: String,
}

impl GenerationNamer {
    /// Create a namer for the given prefix and extension.
    ///
    /// The prefix must stay inside the backend's root: `..` and a leading
    /// `/` are rejected. A missing leading dot on the extension is added.
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> WriterResult<Self> {
        let prefix = prefix.into();
        if prefix.contains("..") || prefix.starts_with('/') {
            return Err(WriterError::ConfigError(format!(
                "Prefix {:?} contains invalid characters",
                prefix
            )));
        }

        let mut extension = extension.into();
        if !extension.is_empty() && !extension.starts_with('.') {
            extension.insert(0, '.');
        }

        Ok(GenerationNamer {
            prefix: prefix.trim_end_matches('/').to_string(),
            extension,
        })
    }

    /// Name for the given generation, relative to the backend's root.
    pub fn name_for(&self, generation: u64) -> String {
        if self.prefix.is_empty() {
            format!("part-{:08}{}", generation, self.extension)
        } else {
            format!("{}/part-{:08}{}", self.prefix, generation, self.extension)
        }
    }
}
