use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PopulateError {
    #[error("Missing document: {class_name} {}", .id.as_deref().unwrap_or("(no id)"))]
    MissingDocument {
        class_name: String,
        id: Option<String>,
    },

    #[error("Missing attachment class `{class_name}` for field `{field}`")]
    MissingAttachmentClass { field: String, class_name: String },

    #[error("Missing related class `{class_name}` for field `{field}`")]
    MissingRelatedClass { field: String, class_name: String },

    #[error("Unknown document class: {0}")]
    UnknownClass(String),

    #[error("Missing backend configuration: {0}")]
    MissingBackendConfig(String),

    #[error("Field `{field}` is declared twice on {class_name}")]
    DuplicateField { class_name: String, field: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing source file: {}", .0.display())]
    MissingSourceFile(PathBuf),

    #[error("Variation `{name}` failed: {message}")]
    Variation { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),

    #[error("Store error: {0}")]
    Store(String),
}

impl PopulateError {
    pub fn missing_document(class_name: &str, id: Option<&str>) -> Self {
        PopulateError::MissingDocument {
            class_name: class_name.to_string(),
            id: id.map(str::to_string),
        }
    }
}

pub type Result<T> = std::result::Result<T, PopulateError>;
