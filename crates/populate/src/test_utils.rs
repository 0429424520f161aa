use std::fs;
use std::path::Path;

use crate::attachment::UploadPayload;

/// Writes `contents` to a scratch file in `dir` and describes it as an upload.
pub fn write_upload(dir: &Path, filename: &str, contents: &[u8]) -> UploadPayload {
    let path = dir.join(format!("upload-{}", uuid::Uuid::new_v4()));
    fs::write(&path, contents).expect("failed to write upload");
    UploadPayload::new(path, filename)
}

// --- Test Fixtures ---

pub mod fixtures {
    use std::sync::Arc;

    use crate::attachment::{AttachmentBackend, MemoryBackend, Variation};
    use crate::document::Document;
    use crate::registry::Registry;
    use crate::schema::{FieldOptions, FieldType};
    use crate::value::Value;

    /// A small music catalogue: `Music::Album` embeds `Music::Track`s (and
    /// `Music::BonusTrack`s), has a position, a select and a `cover`
    /// attachment with a `thumb` (image) and a `backup` (copy) variation.
    pub fn registry_with_attachments() -> (Registry, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new("/attachment"));
        let mut registry = Registry::new();
        let shared: Arc<dyn AttachmentBackend> = backend.clone();
        registry.register_attachment_backend("memory", shared);

        registry
            .define("Music::Track")
            .field("title", FieldOptions::string())
            .field("length", FieldOptions::new(FieldType::Integer))
            .validate(|doc| {
                if doc.get("length").as_int().unwrap_or(0) > 3600 {
                    doc.error_on("length", "Too long");
                }
            })
            .build()
            .expect("track schema");
        registry
            .define("Music::BonusTrack")
            .field("title", FieldOptions::string())
            .field("note", FieldOptions::new(FieldType::Text))
            .build()
            .expect("bonus track schema");
        registry
            .define("Music::Album")
            .field("title", FieldOptions::string().required())
            .field("genre", FieldOptions::string())
            .field(
                "format",
                FieldOptions::new(FieldType::Select).options(["cd", "vinyl", "tape"]),
            )
            .field("price", FieldOptions::new(FieldType::Price))
            .field("released_on", FieldOptions::new(FieldType::Date))
            .field("position", FieldOptions::new(FieldType::Position))
            .field("tracks", FieldOptions::new(FieldType::List))
            .field(
                "cover",
                FieldOptions::new(FieldType::Attachment)
                    .variation(Variation::thumbnail("thumb", "png", 64, 64))
                    .variation(Variation::copy("backup", "txt")),
            )
            .validate(|doc| {
                if doc.get("title").is_blank() {
                    doc.error_on("title", "Is required");
                }
            })
            .build()
            .expect("album schema");

        (registry, backend)
    }

    pub fn registry() -> Registry {
        registry_with_attachments().0
    }

    pub fn album(registry: &Registry, title: &str) -> Document {
        let mut album = Document::new(registry.resolve("Music::Album").expect("album class"));
        album.set("title", Value::text(title));
        album
    }

    pub fn track(registry: &Registry, title: &str) -> Document {
        let mut track = Document::new(registry.resolve("Music::Track").expect("track class"));
        track.set("title", Value::text(title));
        track
    }
}
