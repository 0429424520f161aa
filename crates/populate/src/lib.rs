//! # Populate
//!
//! Schema-described documents for admin backends. An application declares
//! its document classes once, then creates, edits, validates, persists,
//! deletes and renders documents of those classes generically.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Repository (repository.rs)                                 │
//! │  - Registry + storage backend, queries, save / delete       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Documents (document/, validation.rs, outcast.rs)           │
//! │  - Values, nested documents, typecasting, callbacks         │
//! │  - Lifecycle hooks: ids, positions, cascades, attachments   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Schemas (schema/, registry.rs)                             │
//! │  - Field, relationship and callback declarations per class  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Backends (store/, attachment/)                             │
//! │  - MemBackend, FsBackend for documents                      │
//! │  - MemoryBackend, LocalBackend for attachment files         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use populate::{FieldOptions, FieldType, MemBackend, Registry, Repository};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new();
//! registry
//!     .define("Blog::Article")
//!     .field("title", FieldOptions::string().required())
//!     .field("position", FieldOptions::new(FieldType::Position))
//!     .validate(|doc| {
//!         if doc.get("title").is_blank() {
//!             doc.error_on("title", "Is required");
//!         }
//!     })
//!     .build()?;
//!
//! let repo = Repository::new(Arc::new(registry), MemBackend::new());
//! let mut article = repo.build("Blog::Article")?;
//! article.set("title", "Hello");
//! let id = repo.save(&mut article)?;
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: lifecycle writes and file
//! operations at `info`, declarations and skipped saves at `debug`, and
//! best-effort failures (attachment cleanup, variations) at `warn`. Install
//! any `log` implementation to see them.

pub mod attachment;
pub mod cache;
pub mod callbacks;
pub mod config;
pub mod document;
pub mod error;
pub mod naming;
pub mod outcast;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod store;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod typecast;
pub mod validation;
pub mod value;

pub use attachment::{
    Attachment, AttachmentBackend, LocalBackend, MemoryBackend, UploadPayload, Variation,
};
pub use callbacks::{Callback, Placement};
pub use config::PopulateConfig;
pub use document::{Document, FromHashOptions, SetOptions};
pub use error::{PopulateError, Result};
pub use outcast::OutcastOptions;
pub use registry::Registry;
pub use repository::{Context, Repository};
pub use schema::{
    Direction, FieldOptions, FieldType, RelationshipOptions, Schema, SelectOption, SelectOptions,
};
pub use store::{FsBackend, MemBackend, StorageBackend};
pub use validation::ErrorMap;
pub use value::Value;
