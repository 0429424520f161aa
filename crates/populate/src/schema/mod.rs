//! # Field Schema Registry
//!
//! A [`Schema`] is the immutable description of one document class: its
//! fields, relationships, callbacks, validation hook and sort order. Schemas
//! are produced once per class by a [`SchemaBuilder`] (obtained from
//! [`Registry::define`]) and shared by every document of that class.
//!
//! ## Declaration Rules
//!
//! - Field names are unique within a class.
//! - The identity field is always the first field. Declaring a first field
//!   that is not of type `id` inserts a synthetic, hidden `id` field before it.
//! - `list` fields must name a nested class that is already registered, and
//!   `attachment` fields must name a registered attachment backend (or rely on
//!   the registry default). Both are checked when the schema is built.
//! - Declaring a `position` field sorts the class by it unless a sort order
//!   was already given.
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry
//!     .define("Blog::Article")
//!     .field("title", FieldOptions::string().required())
//!     .field("position", FieldOptions::new(FieldType::Position))
//!     .relationship("comments", RelationshipOptions::new())
//!     .build()?;
//! ```

mod field;
mod relationship;

pub use field::{
    DefaultValue, FieldDescriptor, FieldOptions, FieldType, SelectOption, SelectOptions,
};
pub use relationship::{RelationshipDescriptor, RelationshipOptions};

use std::fmt;
use std::sync::Arc;

use crate::cache::DistinctCache;
use crate::callbacks::{Callback, CallbackRegistry, Placement};
use crate::document::{lifecycle, Document};
use crate::error::{PopulateError, Result};
use crate::naming::{demodulize, guess_class_name, label_for, snake_case};
use crate::registry::Registry;
use crate::repository::Context;

/// Class-specific validation hook; reports problems through [`Document::error_on`].
pub type Validator = Arc<dyn Fn(&mut Document) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

pub struct Schema {
    class_name: String,
    label: String,
    fields: Vec<FieldDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    callbacks: CallbackRegistry,
    validator: Option<Validator>,
    sort: Option<(String, Direction)>,
    cache: DistinctCache,
}

impl Schema {
    /// Fully qualified class name, written into every serialized document as `_class`.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the identity field (the first field).
    pub fn id_field(&self) -> &str {
        self.fields.first().map(|f| f.name.as_str()).unwrap_or("id")
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn sort(&self) -> Option<(&str, Direction)> {
        self.sort.as_ref().map(|(f, d)| (f.as_str(), *d))
    }

    pub fn cache(&self) -> &DistinctCache {
        &self.cache
    }

    pub fn nested_list_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_nested_list())
    }

    pub fn attachment_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_attachment())
    }

    pub fn position_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Position)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("class_name", &self.class_name)
            .field("fields", &self.fields)
            .field("relationships", &self.relationships)
            .field("sort", &self.sort)
            .finish_non_exhaustive()
    }
}

/// Collects declarations for one class and registers the finished [`Schema`].
///
/// Declaration errors are remembered and reported by [`SchemaBuilder::build`],
/// so a misconfigured class never reaches the registry.
pub struct SchemaBuilder<'r> {
    registry: &'r mut Registry,
    class_name: String,
    label: Option<String>,
    fields: Vec<FieldDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    callbacks: CallbackRegistry,
    validator: Option<Validator>,
    sort: Option<(String, Direction)>,
    error: Option<PopulateError>,
}

impl<'r> SchemaBuilder<'r> {
    pub(crate) fn new(registry: &'r mut Registry, class_name: &str) -> Self {
        let mut callbacks = CallbackRegistry::new();
        lifecycle::install(&mut callbacks);
        Self {
            registry,
            class_name: class_name.to_string(),
            label: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            callbacks,
            validator: None,
            sort: None,
            error: None,
        }
    }

    fn fail(&mut self, error: PopulateError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn field(mut self, name: &str, options: FieldOptions) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.fields.iter().any(|f| f.name == name) {
            let error = PopulateError::DuplicateField {
                class_name: self.class_name.clone(),
                field: name.to_string(),
            };
            self.fail(error);
            return self;
        }
        if self.fields.is_empty() && options.field_type != FieldType::Id {
            self.fields.push(FieldDescriptor::synthetic_id());
            if name == "id" {
                let error = PopulateError::DuplicateField {
                    class_name: self.class_name.clone(),
                    field: name.to_string(),
                };
                self.fail(error);
                return self;
            }
        }

        let mut descriptor = FieldDescriptor::resolve(name, options);
        match descriptor.field_type.clone() {
            FieldType::List => {
                let class_name = descriptor
                    .class_name
                    .clone()
                    .unwrap_or_else(|| guess_class_name(&self.class_name, name));
                if self.registry.schema(&class_name).is_none() {
                    self.fail(PopulateError::MissingRelatedClass {
                        field: name.to_string(),
                        class_name,
                    });
                    return self;
                }
                descriptor.class_name = Some(class_name);
            }
            FieldType::Attachment => {
                let backend_name = descriptor
                    .class_name
                    .clone()
                    .or_else(|| self.registry.default_attachment_backend().map(str::to_string));
                let backend = backend_name
                    .as_deref()
                    .and_then(|n| self.registry.attachment_backend(n));
                match backend {
                    Some(backend) => {
                        descriptor.attachment_backend = Some(backend);
                        descriptor.class_name = backend_name;
                    }
                    None => {
                        self.fail(PopulateError::MissingAttachmentClass {
                            field: name.to_string(),
                            class_name: backend_name.unwrap_or_default(),
                        });
                        return self;
                    }
                }
            }
            FieldType::Position => {
                if self.sort.is_none() {
                    self.sort = Some((name.to_string(), Direction::Asc));
                }
            }
            FieldType::Custom(type_name) => {
                descriptor.typecaster = self.registry.typecaster(&type_name);
            }
            _ => {}
        }
        self.fields.push(descriptor);
        self
    }

    pub fn relationship(mut self, name: &str, options: RelationshipOptions) -> Self {
        let descriptor = RelationshipDescriptor::resolve(&self.class_name, name, options);
        self.relationships.retain(|r| r.name != name);
        self.relationships.push(descriptor);
        self
    }

    pub fn register_callback(mut self, event: &str, callback: Callback, placement: Placement) -> Self {
        self.callbacks.register(event, callback, placement);
        self
    }

    /// Appends a hook to `before_<event>`.
    pub fn before<F>(mut self, event: &str, f: F) -> Self
    where
        F: Fn(&mut Document, &Context<'_>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.before(event, Callback::hook(f));
        self
    }

    /// Appends a hook to `after_<event>`.
    pub fn after<F>(mut self, event: &str, f: F) -> Self
    where
        F: Fn(&mut Document, &Context<'_>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after(event, Callback::hook(f));
        self
    }

    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Document) + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn sort_by(mut self, field: &str, direction: Direction) -> Self {
        self.sort = Some((field.to_string(), direction));
        self
    }

    pub fn build(self) -> Result<Arc<Schema>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut fields = self.fields;
        if fields.is_empty() {
            fields.push(FieldDescriptor::synthetic_id());
        }
        let schema = Arc::new(Schema {
            label: self
                .label
                .unwrap_or_else(|| label_for(&snake_case(demodulize(&self.class_name)))),
            class_name: self.class_name,
            fields,
            relationships: self.relationships,
            callbacks: self.callbacks,
            validator: self.validator,
            sort: self.sort,
            cache: DistinctCache::new(),
        });
        self.registry.insert_schema(Arc::clone(&schema));
        log::debug!("registered document class {}", schema.class_name());
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::MemoryBackend;

    #[test]
    fn synthetic_id_comes_first() {
        let mut registry = Registry::new();
        let schema = registry
            .define("Article")
            .field("title", FieldOptions::string())
            .field("body", FieldOptions::new(FieldType::Text))
            .build()
            .unwrap();

        let names: Vec<_> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title", "body"]);
        assert_eq!(schema.id_field(), "id");
        assert_eq!(schema.fields()[0].field_type, FieldType::Id);
        assert!(!schema.fields()[0].form_field);
    }

    #[test]
    fn explicit_id_field_is_the_identity() {
        let mut registry = Registry::new();
        let schema = registry
            .define("Article")
            .field("_id", FieldOptions::new(FieldType::Id))
            .field("title", FieldOptions::string())
            .build()
            .unwrap();
        assert_eq!(schema.id_field(), "_id");
        assert_eq!(schema.fields().len(), 2);
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut registry = Registry::new();
        let result = registry
            .define("Article")
            .field("title", FieldOptions::string())
            .field("title", FieldOptions::new(FieldType::Text))
            .build();
        assert!(matches!(result, Err(PopulateError::DuplicateField { .. })));
        assert!(registry.schema("Article").is_none());
    }

    #[test]
    fn list_field_needs_registered_class() {
        let mut registry = Registry::new();
        let result = registry
            .define("Album")
            .field("tracks", FieldOptions::new(FieldType::List))
            .build();
        match result {
            Err(PopulateError::MissingRelatedClass { field, class_name }) => {
                assert_eq!(field, "tracks");
                assert_eq!(class_name, "Track");
            }
            other => panic!("Expected MissingRelatedClass, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn list_field_resolves_guessed_class() {
        let mut registry = Registry::new();
        registry
            .define("Music::Track")
            .field("title", FieldOptions::string())
            .build()
            .unwrap();
        let schema = registry
            .define("Music::Album")
            .field("tracks", FieldOptions::new(FieldType::List))
            .build()
            .unwrap();
        assert_eq!(
            schema.field("tracks").unwrap().class_name.as_deref(),
            Some("Music::Track")
        );
    }

    #[test]
    fn attachment_field_needs_backend() {
        let mut registry = Registry::new();
        let result = registry
            .define("Photo")
            .field("image", FieldOptions::new(FieldType::Attachment))
            .build();
        assert!(matches!(
            result,
            Err(PopulateError::MissingAttachmentClass { .. })
        ));

        registry.register_attachment_backend("memory", Arc::new(MemoryBackend::new("/attachment")));
        let schema = registry
            .define("Photo")
            .field("image", FieldOptions::new(FieldType::Attachment))
            .build()
            .unwrap();
        let field = schema.field("image").unwrap();
        assert!(field.attachment_backend().is_some());
        assert_eq!(field.class_name.as_deref(), Some("memory"));
    }

    #[test]
    fn position_field_sets_default_sort() {
        let mut registry = Registry::new();
        let schema = registry
            .define("Slide")
            .field("title", FieldOptions::string())
            .field("position", FieldOptions::new(FieldType::Position))
            .build()
            .unwrap();
        assert_eq!(schema.sort(), Some(("position", Direction::Asc)));

        let schema = registry
            .define("Slide")
            .sort_by("title", Direction::Desc)
            .field("position", FieldOptions::new(FieldType::Position))
            .build()
            .unwrap();
        assert_eq!(schema.sort(), Some(("title", Direction::Desc)));
    }

    #[test]
    fn class_label_is_derived() {
        let mut registry = Registry::new();
        let schema = registry.define("Blog::BlogPost").build().unwrap();
        assert_eq!(schema.label(), "Blog Post");
        assert_eq!(schema.fields().len(), 1);
    }

    #[test]
    fn relationships_are_registered() {
        let mut registry = Registry::new();
        let schema = registry
            .define("Blog::Article")
            .relationship("comments", RelationshipOptions::new())
            .build()
            .unwrap();
        let rel = schema.relationship("comments").unwrap();
        assert_eq!(rel.class_name, "Blog::Comment");
        assert_eq!(rel.foreign_key, "article_id");
    }
}
