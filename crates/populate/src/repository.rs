//! # Repository
//!
//! [`Repository`] is the entry point for applications: it pairs a shared
//! [`Registry`] with a [`StorageBackend`] and exposes the document queries
//! and lifecycle operations.
//!
//! Lifecycle code and hooks see the same pair through a [`Context`], which
//! is what lets a `before_delete` hook load and delete dependents, or a
//! `before_create` hook look at sibling positions.
//!
//! ```ignore
//! let repo = Repository::new(Arc::new(registry), MemBackend::new());
//! let mut article = repo.build("Blog::Article")?;
//! article.set("title", "Hello");
//! let id = repo.save(&mut article)?;
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::document::{Document, FromHashOptions, SetOptions, CLASS_KEY};
use crate::error::{PopulateError, Result};
use crate::registry::Registry;
use crate::schema::{Direction, Schema};
use crate::store::{DocumentMap, StorageBackend};
use crate::value::Value;

/// Registry and backend, as seen by lifecycle code and hooks.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    registry: &'a Registry,
    backend: &'a dyn StorageBackend,
}

impl<'a> Context<'a> {
    pub fn new(registry: &'a Registry, backend: &'a dyn StorageBackend) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn backend(&self) -> &'a dyn StorageBackend {
        self.backend
    }

    /// Rebuilds a stored record. Records tagged with another registered
    /// class (subclasses sharing a collection) load as that class.
    fn load(&self, schema: &Arc<Schema>, record: DocumentMap) -> Result<Document> {
        let schema = record
            .get(CLASS_KEY)
            .and_then(JsonValue::as_str)
            .filter(|class| *class != schema.class_name())
            .and_then(|class| self.registry.schema(class))
            .unwrap_or_else(|| Arc::clone(schema));
        let mut document = Document::from_hash(
            schema,
            &JsonValue::Object(record),
            FromHashOptions::persisted(),
            self.registry,
        )?;
        document.snapshot = Some(document.to_h());
        Ok(document)
    }

    /// Stored documents of a class, in storage order.
    pub fn documents_of(&self, schema: &Arc<Schema>) -> Result<Vec<Document>> {
        self.backend
            .documents(schema)?
            .into_iter()
            .map(|record| self.load(schema, record))
            .collect()
    }

    /// Stored documents of a class, in the class's sort order.
    pub fn all(&self, class_name: &str) -> Result<Vec<Document>> {
        let schema = self.registry.resolve(class_name)?;
        let mut documents = self.documents_of(&schema)?;
        if let Some((field, direction)) = schema.sort() {
            documents.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        Ok(documents)
    }

    pub fn get(&self, class_name: &str, id: &str) -> Result<Option<Document>> {
        let schema = self.registry.resolve(class_name)?;
        self.backend
            .find(&schema, id)?
            .map(|record| self.load(&schema, record))
            .transpose()
    }

    /// Documents whose `field` equals `value`, in sort order.
    pub fn find_by(&self, class_name: &str, field: &str, value: &Value) -> Result<Vec<Document>> {
        Ok(self
            .all(class_name)?
            .into_iter()
            .filter(|doc| doc.get(field) == value)
            .collect())
    }

    /// Documents pointing at `document` through the named relationship.
    pub fn related(&self, document: &Document, relationship: &str) -> Result<Vec<Document>> {
        let descriptor = document
            .schema()
            .relationship(relationship)
            .ok_or_else(|| PopulateError::MissingRelatedClass {
                field: relationship.to_string(),
                class_name: document.class_name().to_string(),
            })?;
        let Some(id) = document.id() else {
            return Ok(Vec::new());
        };
        self.find_by(
            &descriptor.class_name,
            &descriptor.foreign_key,
            &Value::text(id),
        )
    }

    /// Distinct non-blank values of a field across a class, in order of
    /// first appearance. Cached per class until the next save or delete.
    pub fn distinct_values(&self, schema: &Arc<Schema>, field: &str) -> Result<Vec<Value>> {
        schema.cache().get_or_try_insert_with(field, || {
            let field_type = schema
                .field(field)
                .map(|f| f.field_type.clone())
                .unwrap_or_default();
            let mut values: Vec<Value> = Vec::new();
            for record in self.backend.documents(schema)? {
                let value = record
                    .get(field)
                    .map(|raw| Value::decode(&field_type, raw))
                    .unwrap_or_default();
                if !value.is_blank() && !values.contains(&value) {
                    values.push(value);
                }
            }
            Ok(values)
        })
    }

    /// Writes each id's index into `field`. For a class sorted descending by
    /// that field the order is reversed, so the first id still sorts first.
    pub fn set_indexes(&self, class_name: &str, field: &str, ids: &[String]) -> Result<()> {
        let schema = self.registry.resolve(class_name)?;
        let descending = matches!(schema.sort(), Some((sort_field, Direction::Desc)) if sort_field == field);
        let ordered: Vec<String> = if descending {
            ids.iter().rev().cloned().collect()
        } else {
            ids.to_vec()
        };
        self.backend.set_indexes(&schema, field, &ordered)?;
        schema.cache().invalidate();
        log::debug!("Reindexed {} {} ({} ids)", class_name, field, ids.len());
        Ok(())
    }
}

/// Total order for sorting: nulls first, then by variant, then by value.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Date(_) => 3,
            Value::DateTime(_) => 4,
            Value::Text(_) => 5,
            Value::List(_) => 6,
            Value::Raw(_) => 7,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::List(_), Value::List(_)) | (Value::Raw(_), Value::Raw(_)) => {
            a.to_json().to_string().cmp(&b.to_json().to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Registry plus backend: the application-facing API.
pub struct Repository<B: StorageBackend> {
    registry: Arc<Registry>,
    backend: B,
}

impl<B: StorageBackend> Repository<B> {
    pub fn new(registry: Arc<Registry>, backend: B) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn context(&self) -> Context<'_> {
        Context::new(&self.registry, &self.backend)
    }

    /// A new, unsaved document with defaults applied.
    pub fn build(&self, class_name: &str) -> Result<Document> {
        Ok(Document::new(self.registry.resolve(class_name)?))
    }

    /// A new, unsaved document filled from a hash (typically form input).
    pub fn build_from_hash(
        &self,
        class_name: &str,
        hash: &JsonValue,
        options: SetOptions,
    ) -> Result<Document> {
        let mut document = self.build(class_name)?;
        document.set_from_hash(hash, options, &self.registry)?;
        Ok(document)
    }

    pub fn get(&self, class_name: &str, id: &str) -> Result<Option<Document>> {
        self.context().get(class_name, id)
    }

    pub fn all(&self, class_name: &str) -> Result<Vec<Document>> {
        self.context().all(class_name)
    }

    pub fn find_by(&self, class_name: &str, field: &str, value: &Value) -> Result<Vec<Document>> {
        self.context().find_by(class_name, field, value)
    }

    pub fn related(&self, document: &Document, relationship: &str) -> Result<Vec<Document>> {
        self.context().related(document, relationship)
    }

    pub fn distinct_values(&self, class_name: &str, field: &str) -> Result<Vec<Value>> {
        let schema = self.registry.resolve(class_name)?;
        self.context().distinct_values(&schema, field)
    }

    pub fn save(&self, document: &mut Document) -> Result<Option<String>> {
        document.save(&self.context())
    }

    pub fn delete(&self, document: &mut Document) -> Result<()> {
        document.delete(&self.context())
    }

    pub fn set_indexes(&self, class_name: &str, field: &str, ids: &[String]) -> Result<()> {
        self.context().set_indexes(class_name, field, ids)
    }
}
