//! # Attachments
//!
//! An `attachment` field stores a filename; the file itself lives in an
//! [`AttachmentBackend`]. An [`Attachment`] binds one such field of one
//! document and manages the file and its [`Variation`]s:
//!
//! ```text
//! location  = <attachee prefix>/<filename>         music/album/cover.png
//! variation = <attachee prefix>/<stem>.<name>.<ext> music/album/cover.thumb.jpg
//! url       = backend url of the location          /attachment/music/album/cover.png
//! ```
//!
//! The attachee prefix is the underscored class name of the document.
//!
//! ## Uploads
//!
//! [`Attachment::create`] replaces whatever the field points to:
//!
//! 1. delete the current file and its variations (best effort)
//! 2. sanitize the upload's filename and make it unique (`cover-1.png`, ...)
//! 3. store the upload
//! 4. derive every declared variation; a failing variation is logged and skipped
//!
//! It returns the stored filename. Assigning it to the field is up to the
//! caller; typecasting an upload into a document does exactly that.

mod backend;
mod local;
mod memory;
mod variation;

pub use backend::AttachmentBackend;
pub use local::LocalBackend;
pub use memory::{MemoryBackend, StoredObject};
pub use variation::{Variation, VariationJob};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{PopulateError, Result};
use crate::naming::{is_safe_filename, sanitize_filename, underscore};
use crate::schema::FieldDescriptor;

/// Name of the stored file itself, as opposed to its variations.
pub const ORIGINAL: &str = "original";

/// Upper bound of the `-n` suffixes tried for a free filename.
const MAX_FILENAME_ATTEMPTS: usize = 10_000;

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    pub tempfile_path: PathBuf,
    pub filename: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl UploadPayload {
    pub fn new(tempfile_path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            tempfile_path: tempfile_path.into(),
            filename: filename.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// One attachment field of one document.
pub struct Attachment<'a> {
    document: &'a Document,
    field: &'a FieldDescriptor,
    backend: &'a Arc<dyn AttachmentBackend>,
}

impl<'a> Attachment<'a> {
    pub fn new(document: &'a Document, field_name: &str) -> Result<Self> {
        let field = document
            .schema()
            .field(field_name)
            .filter(|f| f.is_attachment())
            .ok_or_else(|| PopulateError::MissingAttachmentClass {
                field: field_name.to_string(),
                class_name: document.class_name().to_string(),
            })?;
        let backend =
            field
                .attachment_backend()
                .ok_or_else(|| PopulateError::MissingAttachmentClass {
                    field: field_name.to_string(),
                    class_name: field.class_name.clone().unwrap_or_default(),
                })?;
        Ok(Self {
            document,
            field,
            backend,
        })
    }

    pub fn field(&self) -> &FieldDescriptor {
        self.field
    }

    /// The stored filename, if the field holds one. Values that are not a
    /// plain filename (set directly, bypassing typecasting) have no location.
    pub fn field_value(&self) -> Option<&'a str> {
        self.document
            .get(&self.field.name)
            .as_str()
            .filter(|v| is_safe_filename(v))
    }

    pub fn attachee_prefix(&self) -> String {
        underscore(self.document.class_name())
    }

    fn location_of(&self, filename: &str) -> String {
        format!("{}/{}", self.attachee_prefix(), filename)
    }

    /// Filename of a variation of the current file (`ORIGINAL` is the file itself).
    /// `None` when the field is empty or the variation is not declared.
    pub fn variation_filename(&self, variation: &str) -> Option<String> {
        let stored = self.field_value()?;
        if variation == ORIGINAL {
            return Some(stored.to_string());
        }
        self.field
            .variation(variation)
            .map(|v| variation_filename_for(stored, v))
    }

    pub fn location(&self, variation: &str) -> Option<String> {
        self.variation_filename(variation)
            .map(|filename| self.location_of(&filename))
    }

    pub fn url(&self, variation: &str) -> Option<String> {
        self.location(variation)
            .map(|location| self.backend.url(&location))
    }

    /// Whether there is something to delete for this variation.
    pub fn deletable(&self, variation: &str) -> Result<bool> {
        match self.location(variation) {
            Some(location) => self.backend.exists(&location),
            None => Ok(false),
        }
    }

    pub fn delete(&self, variation: &str) -> Result<()> {
        if !self.deletable(variation)? {
            return Ok(());
        }
        if let Some(location) = self.location(variation) {
            self.backend.remove(&location)?;
            info!("Deleted attachment {}", location);
        }
        Ok(())
    }

    /// Deletes the original and every variation. Keeps going past failures
    /// and returns the first one.
    pub fn delete_all(&self) -> Result<()> {
        let names = std::iter::once(ORIGINAL).chain(self.field.variations.iter().map(Variation::name));
        let mut first_error = None;
        for name in names {
            if let Err(e) = self.delete(name) {
                warn!(
                    "Could not delete {} of {}.{}: {}",
                    name,
                    self.document.class_name(),
                    self.field.name,
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `filename`, or the first of `stem-1.ext`, `stem-2.ext`, ... that is free.
    pub fn next_available_filename(&self, filename: &str) -> Result<String> {
        if !self.backend.exists(&self.location_of(filename))? {
            return Ok(filename.to_string());
        }
        let (stem, extension) = split_extension(filename);
        for n in 1..=MAX_FILENAME_ATTEMPTS {
            let candidate = match extension {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            if !self.backend.exists(&self.location_of(&candidate))? {
                return Ok(candidate);
            }
        }
        Err(PopulateError::Store(format!(
            "no free filename for {} under {}",
            filename,
            self.attachee_prefix()
        )))
    }

    /// Stores an upload (see the module docs) and returns the stored filename.
    pub fn create(&self, upload: &UploadPayload) -> Result<String> {
        if !upload.tempfile_path.is_file() {
            return Err(PopulateError::MissingSourceFile(
                upload.tempfile_path.clone(),
            ));
        }
        if let Err(e) = self.delete_all() {
            warn!("Replacing attachment with leftovers: {}", e);
        }
        let filename = self.next_available_filename(&sanitize_filename(&upload.filename))?;
        let location = self.location_of(&filename);
        self.backend
            .store(&upload.tempfile_path, &location, upload.mime_type.as_deref())?;
        info!("Stored attachment {}", location);

        for variation in &self.field.variations {
            if let Err(e) = self.create_variation_for(&filename, variation) {
                warn!("Variation {} of {} failed: {}", variation.name(), location, e);
            }
        }
        Ok(filename)
    }

    /// Regenerates every variation of the current file; returns how many succeeded.
    pub fn create_variations(&self) -> Result<usize> {
        let Some(stored) = self.field_value() else {
            return Ok(0);
        };
        let mut created = 0;
        for variation in &self.field.variations {
            match self.create_variation_for(stored, variation) {
                Ok(()) => created += 1,
                Err(e) => warn!("Variation {} of {} failed: {}", variation.name(), stored, e),
            }
        }
        Ok(created)
    }

    /// Regenerates one variation of the current file.
    pub fn create_variation(&self, variation: &str) -> Result<()> {
        let stored = self.field_value().ok_or_else(|| PopulateError::Variation {
            name: variation.to_string(),
            message: format!("{} is empty", self.field.name),
        })?;
        let variation = self
            .field
            .variation(variation)
            .ok_or_else(|| PopulateError::Variation {
                name: variation.to_string(),
                message: "not declared".to_string(),
            })?;
        self.create_variation_for(stored, variation)
    }

    fn create_variation_for(&self, stored: &str, variation: &Variation) -> Result<()> {
        let original = self.location_of(stored);
        if !self.backend.exists(&original)? {
            return Err(PopulateError::MissingSourceFile(PathBuf::from(original)));
        }
        let filename = variation_filename_for(stored, variation);
        let location = self.location_of(&filename);
        if self.backend.exists(&location)? {
            self.backend.remove(&location)?;
        }

        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join(stored);
        let destination = scratch.path().join(&filename);
        self.backend.fetch(&original, &source)?;
        variation.run(&source, &destination)?;
        self.backend.store(&destination, &location, None)?;
        info!("Created variation {}", location);
        Ok(())
    }
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

fn variation_filename_for(stored: &str, variation: &Variation) -> String {
    let stem = Path::new(stored)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stored);
    format!("{}.{}.{}", stem, variation.name(), variation.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, write_upload};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn upload(dir: &TempDir, filename: &str) -> UploadPayload {
        write_upload(dir.path(), filename, format!("contents of {}", filename).as_bytes())
    }

    #[test]
    fn locations_and_urls() {
        let (registry, _backend) = fixtures::registry_with_attachments();
        let mut album = fixtures::album(&registry, "Blue");
        album.set("cover", "blue.png");
        let attachment = album.attachment("cover").unwrap();

        assert_eq!(attachment.attachee_prefix(), "music/album");
        assert_eq!(attachment.location(ORIGINAL).as_deref(), Some("music/album/blue.png"));
        assert_eq!(
            attachment.variation_filename("thumb").as_deref(),
            Some("blue.thumb.png")
        );
        assert_eq!(
            attachment.url("thumb").as_deref(),
            Some("/attachment/music/album/blue.thumb.png")
        );
        assert_eq!(attachment.url("missing"), None);
    }

    #[test]
    fn empty_field_has_no_location() {
        let (registry, _backend) = fixtures::registry_with_attachments();
        let album = fixtures::album(&registry, "Blue");
        let attachment = album.attachment("cover").unwrap();
        assert_eq!(attachment.location(ORIGINAL), None);
        assert!(!attachment.deletable(ORIGINAL).unwrap());
        attachment.delete_all().unwrap();
    }

    #[test]
    fn non_attachment_field_cannot_bind() {
        let (registry, _backend) = fixtures::registry_with_attachments();
        let album = fixtures::album(&registry, "Blue");
        assert!(matches!(
            album.attachment("title"),
            Err(PopulateError::MissingAttachmentClass { .. })
        ));
    }

    #[test]
    fn create_picks_free_names() {
        let dir = TempDir::new().unwrap();
        let (registry, backend) = fixtures::registry_with_attachments();
        let album = fixtures::album(&registry, "Blue");
        let attachment = album.attachment("cover").unwrap();

        let names: Vec<String> = (0..3)
            .map(|_| attachment.create(&upload(&dir, "my cover.txt")).unwrap())
            .collect();
        assert_eq!(names, vec!["my-cover.txt", "my-cover-1.txt", "my-cover-2.txt"]);
        assert!(backend.exists("music/album/my-cover-2.txt").unwrap());
    }

    #[test]
    fn failing_variation_does_not_abort_create() {
        let dir = TempDir::new().unwrap();
        let (registry, backend) = fixtures::registry_with_attachments();
        let album = fixtures::album(&registry, "Blue");

        // Text is not an image: the thumbnail fails, the copy succeeds.
        let stored = album
            .attachment("cover")
            .unwrap()
            .create(&upload(&dir, "notes.txt"))
            .unwrap();
        assert_eq!(stored, "notes.txt");
        assert_eq!(
            backend.locations(),
            vec!["music/album/notes.backup.txt", "music/album/notes.txt"]
        );
    }

    #[test]
    fn delete_all_tolerates_missing_original() {
        let (registry, backend) = fixtures::registry_with_attachments();
        backend.insert("music/album/a.thumb.png", "thumb");
        backend.insert("music/album/a.backup.txt", "copy");
        let mut album = fixtures::album(&registry, "Blue");
        album.set("cover", "a.png");

        album.attachment("cover").unwrap().delete_all().unwrap();
        assert!(backend.locations().is_empty());
    }

    #[test]
    fn delete_all_reports_first_failure_after_trying_all() {
        let (registry, backend) = fixtures::registry_with_attachments();
        backend.insert("music/album/a.png", "original");
        backend.insert("music/album/a.backup.txt", "copy");
        backend.fail_removal_of("music/album/a.png");
        let mut album = fixtures::album(&registry, "Blue");
        album.set("cover", "a.png");

        let result = album.attachment("cover").unwrap().delete_all();
        assert!(matches!(result, Err(PopulateError::Store(_))));
        assert_eq!(backend.locations(), vec!["music/album/a.png"]);
    }

    #[test]
    fn unsafe_field_value_has_no_location() {
        let (registry, backend) = fixtures::registry_with_attachments();
        backend.insert("victim.txt", "keep me");
        let mut album = fixtures::album(&registry, "Blue");
        album.set("cover", "../../victim.txt");

        let attachment = album.attachment("cover").unwrap();
        assert_eq!(attachment.location(ORIGINAL), None);
        attachment.delete_all().unwrap();
        assert_eq!(backend.locations(), vec!["victim.txt"]);
    }

    #[test]
    fn missing_upload_file() {
        let (registry, _backend) = fixtures::registry_with_attachments();
        let album = fixtures::album(&registry, "Blue");
        let result = album
            .attachment("cover")
            .unwrap()
            .create(&UploadPayload::new("/nonexistent/upload", "a.png"));
        assert!(matches!(result, Err(PopulateError::MissingSourceFile(_))));
    }

    #[test]
    fn filename_helpers() {
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", Some("gz")));
        assert_eq!(split_extension("README"), ("README", None));
        assert_eq!(split_extension(".env"), (".env", None));
    }
}
