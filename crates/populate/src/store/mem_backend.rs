use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::backend::{apply_indexes, id_of, DocumentMap, StorageBackend};
use crate::error::{PopulateError, Result};
use crate::schema::Schema;

/// In-memory storage backend for testing and ephemeral use.
///
/// Collections are keyed by class name. Uses `RefCell` for interior
/// mutability: a backend belongs to one thread.
#[derive(Default)]
pub struct MemBackend {
    collections: RefCell<HashMap<String, Vec<DocumentMap>>>,
    simulate_write_error: RefCell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a store error.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    /// Number of records stored for a class.
    pub fn count(&self, class_name: &str) -> usize {
        self.collections
            .borrow()
            .get(class_name)
            .map_or(0, Vec::len)
    }

    fn check_writable(&self) -> Result<()> {
        if *self.simulate_write_error.borrow() {
            return Err(PopulateError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl StorageBackend for MemBackend {
    fn documents(&self, schema: &Schema) -> Result<Vec<DocumentMap>> {
        let collections = self.collections.borrow();
        Ok(collections
            .get(schema.class_name())
            .cloned()
            .unwrap_or_default())
    }

    fn perform_create(&self, schema: &Schema, doc: &DocumentMap) -> Result<String> {
        self.check_writable()?;
        let mut record = doc.clone();
        let id = match id_of(schema, &record) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert(schema.id_field().to_string(), JsonValue::String(id.clone()));
                id
            }
        };
        self.collections
            .borrow_mut()
            .entry(schema.class_name().to_string())
            .or_default()
            .push(record);
        Ok(id)
    }

    fn perform_update(&self, schema: &Schema, id: &str, doc: &DocumentMap) -> Result<()> {
        self.check_writable()?;
        let mut collections = self.collections.borrow_mut();
        let record = collections
            .get_mut(schema.class_name())
            .and_then(|records| records.iter_mut().find(|r| id_of(schema, r) == Some(id)))
            .ok_or_else(|| PopulateError::missing_document(schema.class_name(), Some(id)))?;
        *record = doc.clone();
        Ok(())
    }

    fn perform_delete(&self, schema: &Schema, id: &str) -> Result<()> {
        self.check_writable()?;
        let mut collections = self.collections.borrow_mut();
        let records = collections.get_mut(schema.class_name());
        let position = records
            .as_ref()
            .and_then(|records| records.iter().position(|r| id_of(schema, r) == Some(id)));
        match (records, position) {
            (Some(records), Some(index)) => {
                records.remove(index);
                Ok(())
            }
            _ => Err(PopulateError::missing_document(schema.class_name(), Some(id))),
        }
    }

    fn set_indexes(&self, schema: &Schema, field: &str, ids: &[String]) -> Result<()> {
        self.check_writable()?;
        let mut collections = self.collections.borrow_mut();
        if let Some(records) = collections.get_mut(schema.class_name()) {
            apply_indexes(schema, records, field, ids);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::schema::FieldOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        let mut registry = Registry::new();
        registry
            .define("Note")
            .field("body", FieldOptions::string())
            .build()
            .unwrap()
    }

    fn record(value: serde_json::Value) -> DocumentMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn create_keeps_or_assigns_ids() {
        let schema = schema();
        let backend = MemBackend::new();
        let id = backend
            .perform_create(&schema, &record(json!({"id": "n1", "body": "a"})))
            .unwrap();
        assert_eq!(id, "n1");

        let generated = backend
            .perform_create(&schema, &record(json!({"body": "b"})))
            .unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_eq!(backend.count("Note"), 2);
        assert!(backend.find(&schema, &generated).unwrap().is_some());
    }

    #[test]
    fn update_and_delete_need_existing_record() {
        let schema = schema();
        let backend = MemBackend::new();
        let doc = record(json!({"id": "n1", "body": "a"}));
        assert!(matches!(
            backend.perform_update(&schema, "n1", &doc),
            Err(PopulateError::MissingDocument { .. })
        ));
        assert!(matches!(
            backend.perform_delete(&schema, "n1"),
            Err(PopulateError::MissingDocument { .. })
        ));

        backend.perform_create(&schema, &doc).unwrap();
        backend
            .perform_update(&schema, "n1", &record(json!({"id": "n1", "body": "b"})))
            .unwrap();
        assert_eq!(
            backend.find(&schema, "n1").unwrap().unwrap()["body"],
            json!("b")
        );
        backend.perform_delete(&schema, "n1").unwrap();
        assert_eq!(backend.count("Note"), 0);
    }

    #[test]
    fn set_indexes_only_touches_listed_records() {
        let schema = schema();
        let backend = MemBackend::new();
        for id in ["a", "b", "c"] {
            backend
                .perform_create(&schema, &record(json!({"id": id, "position": 9})))
                .unwrap();
        }
        backend
            .set_indexes(&schema, "position", &["c".to_string(), "a".to_string()])
            .unwrap();

        let positions: Vec<_> = backend
            .documents(&schema)
            .unwrap()
            .iter()
            .map(|d| d["position"].as_i64().unwrap())
            .collect();
        assert_eq!(positions, vec![1, 9, 0]);
    }

    #[test]
    fn simulated_write_error() {
        let schema = schema();
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        assert!(matches!(
            backend.perform_create(&schema, &record(json!({"body": "a"}))),
            Err(PopulateError::Store(_))
        ));
    }
}
