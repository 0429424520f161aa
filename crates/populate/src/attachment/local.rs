use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;

use super::backend::{join_url, AttachmentBackend};
use crate::config::AttachmentConfig;
use crate::error::{PopulateError, Result};

/// Files under a root directory, served from `url_prefix`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn from_config(config: &AttachmentConfig) -> Result<Self> {
        let root = config.root.clone().ok_or_else(|| {
            PopulateError::MissingBackendConfig("attachment.root is not set".to_string())
        })?;
        Ok(Self::new(root, config.url_prefix.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a location under the root. Locations that would leave the
    /// root (absolute, or with `..` components) are refused.
    pub fn path_for(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained || location.contains('\\') {
            return Err(PopulateError::MalformedInput(format!(
                "attachment location `{}` leaves {}",
                location,
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl AttachmentBackend for LocalBackend {
    fn exists(&self, location: &str) -> Result<bool> {
        Ok(self.path_for(location)?.is_file())
    }

    fn store(&self, source: &Path, location: &str, _mime_type: Option<&str>) -> Result<()> {
        if !source.is_file() {
            return Err(PopulateError::MissingSourceFile(source.to_path_buf()));
        }
        let path = self.path_for(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(PopulateError::Io)?;
        }
        fs::copy(source, &path).map_err(PopulateError::Io)?;
        debug!("stored {} at {}", location, path.display());
        Ok(())
    }

    fn fetch(&self, location: &str, destination: &Path) -> Result<()> {
        let path = self.path_for(location)?;
        if !path.is_file() {
            return Err(PopulateError::MissingSourceFile(path));
        }
        fs::copy(&path, destination).map_err(PopulateError::Io)?;
        Ok(())
    }

    fn remove(&self, location: &str) -> Result<()> {
        fs::remove_file(self.path_for(location)?).map_err(PopulateError::Io)
    }

    fn url(&self, location: &str) -> String {
        join_url(&self.url_prefix, location)
    }
}
