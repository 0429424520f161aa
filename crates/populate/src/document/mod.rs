//! # Document Entity
//!
//! A [`Document`] is one instance of a declared class. It holds a [`Value`]
//! for every declared field, the nested (owned) documents of its `list`
//! fields, its lifecycle state and its last validation errors. The behavior
//! of a document is split across modules:
//!
//! - this module: construction, field access, hash conversion, callbacks
//! - [`lifecycle`]: `save` / `delete` and the built-in lifecycle hooks
//! - [`crate::validation`]: `is_valid`, `error_on`, `error_report`
//! - [`crate::outcast`]: presentation structures for renderers
//! - [`crate::attachment`]: the attachment binding of file fields
//!
//! ## Serialized Form
//!
//! [`Document::to_h`] produces the stored form: every declared field keyed by
//! name, nested lists as arrays of their own stored forms, and always a
//! `_class` discriminator so the document can be rebuilt polymorphically:
//!
//! ```text
//! { "_class": "Music::Album", "id": "…", "title": "Blue", "tracks": [ { "_class": "Music::Track", … } ] }
//! ```
//!
//! Two documents are equal when their serialized forms are equal.
//!
//! ## State
//!
//! ```text
//! New (is_new, no id) --save--> Persisted (id, snapshot) --save--> Persisted (update)
//!                                      |
//!                                      +--delete--> Detached (is_new again, record gone)
//! ```

pub mod lifecycle;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::attachment::{Attachment, UploadPayload};
use crate::callbacks::Callback;
use crate::error::{PopulateError, Result};
use crate::naming::is_safe_filename;
use crate::registry::Registry;
use crate::repository::Context;
use crate::schema::{FieldDescriptor, Schema};
use crate::typecast::{self, typecast};
use crate::validation::ErrorMap;
use crate::value::Value;

/// Key of the class discriminator in serialized documents.
pub const CLASS_KEY: &str = "_class";

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    /// Run incoming values through typecasting (form input) instead of
    /// decoding them as already-stored values.
    pub typecast: bool,
}

impl SetOptions {
    pub fn typecast() -> Self {
        Self { typecast: true }
    }
}

/// Defaults to a new document: hashes describe unsaved input unless the
/// caller says the record is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FromHashOptions {
    pub typecast: bool,
    pub is_new: bool,
}

impl Default for FromHashOptions {
    fn default() -> Self {
        Self {
            typecast: false,
            is_new: true,
        }
    }
}

impl FromHashOptions {
    /// Options for rebuilding a record that already exists in a backend.
    pub fn persisted() -> Self {
        Self {
            typecast: false,
            is_new: false,
        }
    }
}

#[derive(Clone)]
pub struct Document {
    pub(crate) schema: Arc<Schema>,
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) nested: BTreeMap<String, Vec<Document>>,
    pub(crate) is_new: bool,
    pub(crate) errors: ErrorMap,
    pub(crate) snapshot: Option<Map<String, JsonValue>>,
}

impl Document {
    /// A new, unsaved document with every field defaulted in declaration order.
    pub fn new(schema: Arc<Schema>) -> Self {
        let mut document = Self {
            schema: Arc::clone(&schema),
            values: BTreeMap::new(),
            nested: BTreeMap::new(),
            is_new: true,
            errors: ErrorMap::new(),
            snapshot: None,
        };
        for field in schema.fields() {
            if field.is_nested_list() {
                document.nested.insert(field.name.clone(), Vec::new());
                continue;
            }
            let value = field
                .default
                .as_ref()
                .map(|default| default.produce(&document))
                .unwrap_or_default();
            document.values.insert(field.name.clone(), value);
        }
        document
    }

    pub fn from_hash(
        schema: Arc<Schema>,
        hash: &JsonValue,
        options: FromHashOptions,
        registry: &Registry,
    ) -> Result<Self> {
        let mut document = Document::new(schema);
        document.is_new = options.is_new;
        document.set_from_hash(
            hash,
            SetOptions {
                typecast: options.typecast,
            },
            registry,
        )?;
        Ok(document)
    }

    /// Rebuilds a document whose class is named by its `_class` key.
    pub fn from_tagged_hash(
        hash: &JsonValue,
        options: FromHashOptions,
        registry: &Registry,
    ) -> Result<Self> {
        let class_name = hash
            .get(CLASS_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                PopulateError::MalformedInput(format!("missing `{}` key", CLASS_KEY))
            })?;
        let schema = registry.resolve(class_name)?;
        Document::from_hash(schema, hash, options, registry)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn class_name(&self) -> &str {
        self.schema.class_name()
    }

    pub fn id(&self) -> Option<&str> {
        self.values
            .get(self.schema.id_field())
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether the document differs from what was last saved.
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => *snapshot != self.to_h(),
            None => true,
        }
    }

    pub fn snapshot(&self) -> Option<&Map<String, JsonValue>> {
        self.snapshot.as_ref()
    }

    /// Value of a field; unknown and unset fields read as [`Value::Null`].
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    /// Plain setter, no typecasting. Returns false for unknown fields and
    /// for nested list fields (use [`Document::nested_mut`] for those).
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> bool {
        match self.schema.field(field) {
            Some(descriptor) if !descriptor.is_nested_list() => {
                self.values.insert(field.to_string(), value.into());
                true
            }
            _ => false,
        }
    }

    pub fn nested(&self, field: &str) -> &[Document] {
        self.nested.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nested_mut(&mut self, field: &str) -> Option<&mut Vec<Document>> {
        self.nested.get_mut(field)
    }

    pub fn push_nested(&mut self, field: &str, document: Document) -> Result<()> {
        let children = self.nested.get_mut(field).ok_or_else(|| {
            PopulateError::MalformedInput(format!(
                "{} has no list field `{}`",
                self.schema.class_name(),
                field
            ))
        })?;
        children.push(document);
        Ok(())
    }

    /// Every nested document, list by list.
    pub fn nested_documents(&self) -> impl Iterator<Item = &Document> {
        self.nested.values().flatten()
    }

    /// Assigns values from a hash.
    ///
    /// `_class` and keys that are not declared fields are ignored. Arrays on
    /// list fields rebuild the whole nested collection, each item resolved
    /// through its own `_class` (falling back to the field's class).
    pub fn set_from_hash(
        &mut self,
        hash: &JsonValue,
        options: SetOptions,
        registry: &Registry,
    ) -> Result<()> {
        let map = hash.as_object().ok_or_else(|| {
            PopulateError::MalformedInput(format!(
                "{} expects an object, got {}",
                self.schema.class_name(),
                json_kind(hash)
            ))
        })?;
        let schema = Arc::clone(&self.schema);
        for (key, raw) in map {
            if key == CLASS_KEY {
                continue;
            }
            let Some(field) = schema.field(key) else {
                continue;
            };
            if field.is_nested_list() {
                let children = self.build_nested(field, raw, options, registry)?;
                self.nested.insert(key.clone(), children);
            } else if options.typecast {
                let value = self.typecast_field(field, raw)?;
                self.values.insert(key.clone(), value);
            } else {
                self.values
                    .insert(key.clone(), Value::decode(&field.field_type, raw));
            }
        }
        Ok(())
    }

    /// Typecasts one raw value into a field. Attachment fields go through
    /// the attachment pipeline (uploads are stored, blanks delete the files).
    pub fn set_from_raw(&mut self, field: &str, raw: &JsonValue) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let Some(descriptor) = schema.field(field) else {
            return Ok(());
        };
        if descriptor.is_nested_list() {
            return Err(PopulateError::MalformedInput(format!(
                "`{}` is a list field, use set_from_hash",
                field
            )));
        }
        let value = self.typecast_field(descriptor, raw)?;
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Attachment input: `null` clears the field and deletes its files, a
    /// blank string keeps the current file (an untouched file input), a
    /// string names an already stored file and an object is an upload.
    fn typecast_field(&self, field: &FieldDescriptor, raw: &JsonValue) -> Result<Value> {
        if !field.is_attachment() {
            return Ok(typecast(field, raw));
        }
        let attachment = self.attachment(&field.name)?;
        match raw {
            JsonValue::Null => {
                attachment.delete_all()?;
                Ok(Value::Null)
            }
            JsonValue::String(_) if typecast::is_blank(raw) => {
                Ok(self.get(&field.name).clone())
            }
            JsonValue::String(stored) if is_safe_filename(stored) => {
                Ok(Value::Text(stored.clone()))
            }
            JsonValue::String(stored) => Err(PopulateError::MalformedInput(format!(
                "attachment `{}` cannot point at `{}`",
                field.name, stored
            ))),
            JsonValue::Object(_) => {
                let upload: UploadPayload = serde_json::from_value(raw.clone())?;
                Ok(Value::Text(attachment.create(&upload)?))
            }
            other => Err(PopulateError::MalformedInput(format!(
                "attachment `{}` expects an upload, got {}",
                field.name,
                json_kind(other)
            ))),
        }
    }

    fn build_nested(
        &self,
        field: &FieldDescriptor,
        raw: &JsonValue,
        options: SetOptions,
        registry: &Registry,
    ) -> Result<Vec<Document>> {
        let items = match raw {
            JsonValue::Null => return Ok(Vec::new()),
            JsonValue::Array(items) => items,
            other => {
                return Err(PopulateError::MalformedInput(format!(
                    "list `{}` expects an array, got {}",
                    field.name,
                    json_kind(other)
                )))
            }
        };
        let child_options = FromHashOptions {
            typecast: options.typecast,
            is_new: self.is_new,
        };
        items
            .iter()
            .map(|item| {
                let class_name = item
                    .get(CLASS_KEY)
                    .and_then(JsonValue::as_str)
                    .or(field.class_name.as_deref())
                    .ok_or_else(|| {
                        PopulateError::MalformedInput(format!(
                            "item of `{}` has no `{}`",
                            field.name, CLASS_KEY
                        ))
                    })?;
                let schema = registry.resolve(class_name)?;
                Document::from_hash(schema, item, child_options, registry)
            })
            .collect()
    }

    /// Stored form of the document, `_class` included.
    pub fn to_h(&self) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert(
            CLASS_KEY.to_string(),
            JsonValue::String(self.schema.class_name().to_string()),
        );
        for field in self.schema.fields() {
            let json = if field.is_nested_list() {
                JsonValue::Array(
                    self.nested(&field.name)
                        .iter()
                        .map(|child| JsonValue::Object(child.to_h()))
                        .collect(),
                )
            } else {
                self.get(&field.name).to_json()
            };
            map.insert(field.name.clone(), json);
        }
        map
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_h())
    }

    /// Binds an attachment field of this document.
    pub fn attachment(&self, field: &str) -> Result<Attachment<'_>> {
        Attachment::new(self, field)
    }

    /// Runs the hooks registered for `event`, in order. No hooks is a no-op.
    pub fn exec_callback(&mut self, event: &str, cx: &Context<'_>) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let handlers = schema.callbacks().handlers(event);
        if !handlers.is_empty() {
            log::trace!(
                "{} {}: {} callback(s)",
                schema.class_name(),
                event,
                handlers.len()
            );
        }
        for callback in handlers {
            match callback {
                Callback::Hook(hook) => hook(self, cx, event)?,
                Callback::RecurseNested => self.recurse_callback(event, cx)?,
            }
        }
        Ok(())
    }

    /// Fires `event` on every nested document.
    pub fn recurse_callback(&mut self, event: &str, cx: &Context<'_>) -> Result<()> {
        for children in self.nested.values_mut() {
            for child in children.iter_mut() {
                child.exec_callback(event, cx)?;
            }
        }
        Ok(())
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.to_h() == other.to_h()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("class_name", &self.schema.class_name())
            .field("values", &self.values)
            .field("nested", &self.nested)
            .field("is_new", &self.is_new)
            .field("errors", &self.errors)
            .finish()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
