//! # Storage Layer
//!
//! Documents persist through a [`StorageBackend`]. A backend only moves
//! serialized documents (`to_h` maps, `_class` included) in and out of
//! per-class collections; everything else (callbacks, ids, positions,
//! cascades) lives in the document lifecycle.
//!
//! ## Contract
//!
//! - `perform_create` stores a new record and returns its id.
//! - `perform_update` and `perform_delete` fail with `MissingDocument` when
//!   no record has the id.
//! - `set_indexes` writes each listed id's index into a field, in one pass.
//! - `documents` returns the records of one class in insertion order.
//!
//! ## Backends
//!
//! - [`MemBackend`]: in-process maps, for tests and ephemeral use.
//! - [`FsBackend`]: one JSON array per class under a data directory, written
//!   atomically.

pub mod backend;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::{DocumentMap, StorageBackend};
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
