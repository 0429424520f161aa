use std::path::Path;

use crate::error::Result;

/// Where attachment files live.
///
/// A location is a `/`-separated key such as `music/album/cover.jpg`. How it
/// maps to storage and to a public URL is up to the backend.
pub trait AttachmentBackend: Send + Sync {
    fn exists(&self, location: &str) -> Result<bool>;

    /// Copies the file at `source` to `location`, replacing what is there.
    fn store(&self, source: &Path, location: &str, mime_type: Option<&str>) -> Result<()>;

    /// Copies the object at `location` into the local file `destination`.
    fn fetch(&self, location: &str, destination: &Path) -> Result<()>;

    fn remove(&self, location: &str) -> Result<()>;

    fn url(&self, location: &str) -> String;
}

pub(crate) fn join_url(prefix: &str, location: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), location)
}
