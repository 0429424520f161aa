use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::schema::Schema;

/// A document in its stored form.
pub type DocumentMap = Map<String, JsonValue>;

/// Abstract interface for document persistence.
///
/// Methods take `&self`; implementations use interior mutability so that a
/// backend can be shared by a repository and the contexts it hands to hooks.
pub trait StorageBackend {
    /// All stored records of the schema's class, in insertion order.
    fn documents(&self, schema: &Schema) -> Result<Vec<DocumentMap>>;

    /// The record whose identity field equals `id`.
    fn find(&self, schema: &Schema, id: &str) -> Result<Option<DocumentMap>> {
        Ok(self
            .documents(schema)?
            .into_iter()
            .find(|doc| id_of(schema, doc) == Some(id)))
    }

    /// Stores a new record and returns its id.
    fn perform_create(&self, schema: &Schema, doc: &DocumentMap) -> Result<String>;

    /// Replaces the record with the given id.
    fn perform_update(&self, schema: &Schema, id: &str, doc: &DocumentMap) -> Result<()>;

    fn perform_delete(&self, schema: &Schema, id: &str) -> Result<()>;

    /// Sets `field` of each listed record to its index in `ids`.
    /// Records that are not listed keep their value.
    fn set_indexes(&self, schema: &Schema, field: &str, ids: &[String]) -> Result<()>;
}

/// Identity of a stored record, if it has one.
pub fn id_of<'a>(schema: &Schema, doc: &'a DocumentMap) -> Option<&'a str> {
    doc.get(schema.id_field())
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
}

/// Applies `set_indexes` to an in-memory collection; shared by the backends.
pub(crate) fn apply_indexes(schema: &Schema, records: &mut [DocumentMap], field: &str, ids: &[String]) {
    for record in records.iter_mut() {
        let position = id_of(schema, record).and_then(|id| ids.iter().position(|i| i == id));
        if let Some(index) = position {
            record.insert(field.to_string(), JsonValue::from(index as i64));
        }
    }
}
