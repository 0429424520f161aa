use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use parking_lot::RwLock;

use super::backend::{join_url, AttachmentBackend};
use crate::error::{PopulateError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Object store kept in memory, addressed like a bucket: `<url_prefix>/<location>`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    url_prefix: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    failing_removals: RwLock<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            ..Default::default()
        }
    }

    pub fn object(&self, location: &str) -> Option<StoredObject> {
        self.objects.read().get(location).cloned()
    }

    /// Stored locations, sorted.
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self.objects.read().keys().cloned().collect();
        locations.sort();
        locations
    }

    pub fn insert(&self, location: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.write().insert(
            location.to_string(),
            StoredObject {
                bytes: bytes.into(),
                mime_type: None,
            },
        );
    }

    /// Makes removing `location` fail from now on.
    pub fn fail_removal_of(&self, location: &str) {
        self.failing_removals.write().insert(location.to_string());
    }
}

impl AttachmentBackend for MemoryBackend {
    fn exists(&self, location: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(location))
    }

    fn store(&self, source: &Path, location: &str, mime_type: Option<&str>) -> Result<()> {
        if !source.is_file() {
            return Err(PopulateError::MissingSourceFile(source.to_path_buf()));
        }
        let bytes = fs::read(source).map_err(PopulateError::Io)?;
        self.objects.write().insert(
            location.to_string(),
            StoredObject {
                bytes,
                mime_type: mime_type.map(str::to_string),
            },
        );
        Ok(())
    }

    fn fetch(&self, location: &str, destination: &Path) -> Result<()> {
        let objects = self.objects.read();
        let object = objects
            .get(location)
            .ok_or_else(|| PopulateError::MissingSourceFile(location.into()))?;
        fs::write(destination, &object.bytes).map_err(PopulateError::Io)
    }

    fn remove(&self, location: &str) -> Result<()> {
        if self.failing_removals.read().contains(location) {
            return Err(PopulateError::Store(format!(
                "Simulated remove error for {}",
                location
            )));
        }
        self.objects
            .write()
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| PopulateError::MissingSourceFile(location.into()))
    }

    fn url(&self, location: &str) -> String {
        join_url(&self.url_prefix, location)
    }
}
