//! Field types, declaration options and resolved field descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::attachment::{AttachmentBackend, Variation};
use crate::document::Document;
use crate::naming::label_for;
use crate::typecast::Typecaster;
use crate::value::Value;

/// The declared type of a field.
///
/// The type drives typecasting, outcasting, serialization and the built-in
/// lifecycle behaviors (identity, positions, attachments, nested lists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    #[default]
    String,
    Text,
    Boolean,
    Integer,
    /// Decimal amount stored as integer cents
    Price,
    Date,
    Datetime,
    Select,
    /// Collection of nested (owned) documents
    List,
    Attachment,
    Id,
    /// Sort index, defaulted on create within an optional scope
    Position,
    Hidden,
    /// A type registered through [`crate::Registry::register_typecaster`]
    Custom(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Price => "price",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Select => "select",
            FieldType::List => "list",
            FieldType::Attachment => "attachment",
            FieldType::Id => "id",
            FieldType::Position => "position",
            FieldType::Hidden => "hidden",
            FieldType::Custom(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "boolean" => FieldType::Boolean,
            "integer" => FieldType::Integer,
            "price" => FieldType::Price,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "select" => FieldType::Select,
            "list" => FieldType::List,
            "attachment" => FieldType::Attachment,
            "id" => FieldType::Id,
            "position" => FieldType::Position,
            "hidden" => FieldType::Hidden,
            other => FieldType::Custom(other.to_string()),
        })
    }
}

/// Default value of a field, applied when a document is constructed.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Receives the document being built (fields declared earlier are already set)
    FromDocument(Arc<dyn Fn(&Document) -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self, document: &Document) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Producer(f) => f(),
            DefaultValue::FromDocument(f) => f(document),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
            DefaultValue::FromDocument(_) => f.write_str("FromDocument(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub description: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(description: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for SelectOption {
    fn from(value: &str) -> Self {
        SelectOption::new(value, value)
    }
}

/// Where the choices of a select field come from.
#[derive(Clone)]
pub enum SelectOptions {
    Static(Vec<SelectOption>),
    Producer(Arc<dyn Fn() -> Vec<SelectOption> + Send + Sync>),
    FromDocument(Arc<dyn Fn(&Document) -> Vec<SelectOption> + Send + Sync>),
}

impl SelectOptions {
    pub fn resolve(&self, document: &Document) -> Vec<SelectOption> {
        match self {
            SelectOptions::Static(options) => options.clone(),
            SelectOptions::Producer(f) => f(),
            SelectOptions::FromDocument(f) => f(document),
        }
    }
}

impl fmt::Debug for SelectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectOptions::Static(options) => f.debug_tuple("Static").field(options).finish(),
            SelectOptions::Producer(_) => f.write_str("Producer(..)"),
            SelectOptions::FromDocument(_) => f.write_str("FromDocument(..)"),
        }
    }
}

/// Options given when declaring a field.
///
/// Anything left unset is computed when the field is resolved into a
/// [`FieldDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub label: Option<String>,
    pub form_field: Option<bool>,
    pub wrap: Option<bool>,
    pub multiple: bool,
    pub ordered: bool,
    pub scope: Option<String>,
    pub class_name: Option<String>,
    pub variations: Vec<Variation>,
    pub select_options: Option<SelectOptions>,
    pub input_attributes: BTreeMap<String, String>,
}

impl FieldOptions {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    pub fn default_from<F>(mut self, producer: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::FromDocument(Arc::new(producer)));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn form_field(mut self, form_field: bool) -> Self {
        self.form_field = Some(form_field);
        self
    }

    pub fn wrap(mut self, wrap: bool) -> Self {
        self.wrap = Some(wrap);
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Multi-selects list their selected options first, in value order.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn scope(mut self, field: impl Into<String>) -> Self {
        self.scope = Some(field.into());
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn variation(mut self, variation: Variation) -> Self {
        self.variations.push(variation);
        self
    }

    pub fn select_options(mut self, options: SelectOptions) -> Self {
        self.select_options = Some(options);
        self
    }

    /// Static choices where description and value are the same string.
    pub fn options<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let options = values
            .into_iter()
            .map(|v| SelectOption::from(v.as_ref()))
            .collect();
        self.select_options(SelectOptions::Static(options))
    }

    pub fn input_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.input_attributes.insert(key.into(), value.into());
        self
    }
}

/// A declared field with every default computed.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub label: String,
    /// Whether the field is exposed in forms
    pub form_field: bool,
    /// Whether a renderer should wrap the input with its label
    pub wrap: bool,
    pub multiple: bool,
    pub ordered: bool,
    pub scope: Option<String>,
    pub class_name: Option<String>,
    pub variations: Vec<Variation>,
    pub select_options: Option<SelectOptions>,
    pub input_attributes: BTreeMap<String, String>,
    pub(crate) attachment_backend: Option<Arc<dyn AttachmentBackend>>,
    pub(crate) typecaster: Option<Typecaster>,
}

impl FieldDescriptor {
    pub(crate) fn resolve(name: &str, options: FieldOptions) -> Self {
        let field_type = options.field_type;
        let structural = matches!(
            field_type,
            FieldType::Id | FieldType::Position | FieldType::Hidden
        );

        let mut input_attributes = options.input_attributes;
        let input_type = if field_type == FieldType::Hidden {
            "hidden"
        } else {
            "text"
        };
        input_attributes
            .entry("type".to_string())
            .or_insert_with(|| input_type.to_string());
        if options.required {
            input_attributes
                .entry("required".to_string())
                .or_insert_with(|| "required".to_string());
        }

        Self {
            name: name.to_string(),
            required: options.required,
            default: options.default,
            label: options.label.unwrap_or_else(|| label_for(name)),
            form_field: options
                .form_field
                .unwrap_or(!matches!(field_type, FieldType::Id | FieldType::Position)),
            wrap: options.wrap.unwrap_or(!structural),
            multiple: options.multiple,
            ordered: options.ordered,
            scope: options.scope,
            class_name: options.class_name,
            variations: options.variations,
            select_options: options.select_options,
            input_attributes,
            attachment_backend: None,
            typecaster: None,
            field_type,
        }
    }

    /// The synthetic identity field inserted before the first declared field.
    pub(crate) fn synthetic_id() -> Self {
        Self::resolve("id", FieldOptions::new(FieldType::Id).form_field(false))
    }

    pub fn is_nested_list(&self) -> bool {
        self.field_type == FieldType::List
    }

    pub fn is_attachment(&self) -> bool {
        self.field_type == FieldType::Attachment
    }

    pub fn attachment_backend(&self) -> Option<&Arc<dyn AttachmentBackend>> {
        self.attachment_backend.as_ref()
    }

    pub fn variation(&self, name: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.name() == name)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("label", &self.label)
            .field("form_field", &self.form_field)
            .field("multiple", &self.multiple)
            .field("scope", &self.scope)
            .field("class_name", &self.class_name)
            .field("variations", &self.variations)
            .finish_non_exhaustive()
    }
}
