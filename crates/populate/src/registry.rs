//! Class registry.
//!
//! The registry maps fully qualified class names to their [`Schema`], which
//! is how a serialized document's `_class` key is turned back into a typed
//! document. It also holds the named attachment backends and custom
//! typecasters that schemas resolve against while they are being built.
//!
//! Registration happens once, before documents are created. After that the
//! registry is shared read-only (typically behind an `Arc`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::attachment::AttachmentBackend;
use crate::error::{PopulateError, Result};
use crate::schema::{FieldDescriptor, Schema, SchemaBuilder};
use crate::typecast::Typecaster;
use crate::value::Value;

#[derive(Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<Schema>>,
    attachment_backends: HashMap<String, Arc<dyn AttachmentBackend>>,
    default_attachment_backend: Option<String>,
    typecasters: HashMap<String, Typecaster>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts declaring a document class. The schema is registered by
    /// [`SchemaBuilder::build`]; defining an existing name replaces it.
    pub fn define(&mut self, class_name: &str) -> SchemaBuilder<'_> {
        SchemaBuilder::new(self, class_name)
    }

    pub(crate) fn insert_schema(&mut self, schema: Arc<Schema>) {
        self.schemas
            .insert(schema.class_name().to_string(), schema);
    }

    pub fn schema(&self, class_name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(class_name).cloned()
    }

    /// Like [`Registry::schema`] but unknown names are an error.
    pub fn resolve(&self, class_name: &str) -> Result<Arc<Schema>> {
        self.schema(class_name)
            .ok_or_else(|| PopulateError::UnknownClass(class_name.to_string()))
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registers an attachment backend under `name`. The first backend
    /// registered becomes the default for attachment fields that name none.
    pub fn register_attachment_backend(&mut self, name: &str, backend: Arc<dyn AttachmentBackend>) {
        if self.default_attachment_backend.is_none() {
            self.default_attachment_backend = Some(name.to_string());
        }
        self.attachment_backends.insert(name.to_string(), backend);
    }

    pub fn set_default_attachment_backend(&mut self, name: &str) -> Result<()> {
        if !self.attachment_backends.contains_key(name) {
            return Err(PopulateError::MissingBackendConfig(format!(
                "no attachment backend named `{}`",
                name
            )));
        }
        self.default_attachment_backend = Some(name.to_string());
        Ok(())
    }

    pub fn default_attachment_backend(&self) -> Option<&str> {
        self.default_attachment_backend.as_deref()
    }

    pub fn attachment_backend(&self, name: &str) -> Option<Arc<dyn AttachmentBackend>> {
        self.attachment_backends.get(name).cloned()
    }

    /// Registers the typecast used by fields of the custom type `type_name`.
    /// Must happen before the schemas using the type are built.
    pub fn register_typecaster<F>(&mut self, type_name: &str, f: F)
    where
        F: Fn(&FieldDescriptor, &JsonValue) -> Value + Send + Sync + 'static,
    {
        self.typecasters
            .insert(type_name.to_string(), Arc::new(f));
    }

    pub fn typecaster(&self, type_name: &str) -> Option<Typecaster> {
        self.typecasters.get(type_name).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut backends: Vec<&String> = self.attachment_backends.keys().collect();
        backends.sort();
        f.debug_struct("Registry")
            .field("classes", &self.class_names())
            .field("attachment_backends", &backends)
            .field("default_attachment_backend", &self.default_attachment_backend)
            .finish_non_exhaustive()
    }
}
