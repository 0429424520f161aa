//! # Outcasting
//!
//! The inverse of typecasting: a field's value turned into a structure a
//! form renderer can use directly. Every field yields:
//!
//! | Key | Content |
//! |-----|---------|
//! | `field_name` | declared name |
//! | `type` | field type name |
//! | `label`, `wrap`, `required` | from the field declaration |
//! | `input_name` | `data[title]`, `data[tracks][][title]` for nested fields, `[]` appended for multi-selects |
//! | `input_value` | display form: prices as `42.57`, dates as `dd/mm/yyyy` |
//! | `input_attributes` | declared attributes (`type`, `required`, ...) |
//!
//! plus, per type:
//!
//! - `select`: `select_options`, each with `description`, `value`, `selected`
//! - `list`: `items`, one `{class_name, label, fields}` per nested document
//! - `attachment`: `url` and `variations` (name to URL)
//!
//! The display forms are accepted back by typecasting.

use serde_json::{json, Map, Value as JsonValue};

use crate::attachment::ORIGINAL;
use crate::document::Document;
use crate::schema::{FieldDescriptor, FieldType, SelectOption};
use crate::value::Value;

pub const DEFAULT_INPUT_PREFIX: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcastOptions {
    /// Wraps every input name: `<prefix>[field]`
    pub input_name_prefix: String,
}

impl Default for OutcastOptions {
    fn default() -> Self {
        Self {
            input_name_prefix: DEFAULT_INPUT_PREFIX.to_string(),
        }
    }
}

impl OutcastOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            input_name_prefix: prefix.into(),
        }
    }
}

impl Document {
    /// Presentation structure of one field; `None` for unknown fields.
    pub fn outcast(&self, field: &str, options: &OutcastOptions) -> Option<JsonValue> {
        let descriptor = self.schema().field(field)?;
        Some(outcast_field(self, descriptor, &options.input_name_prefix))
    }

    /// Presentation structures of every form field, in declaration order.
    pub fn outcast_form(&self, options: &OutcastOptions) -> Vec<JsonValue> {
        self.schema()
            .fields()
            .iter()
            .filter(|field| field.form_field)
            .map(|field| outcast_field(self, field, &options.input_name_prefix))
            .collect()
    }
}

fn outcast_field(document: &Document, field: &FieldDescriptor, prefix: &str) -> JsonValue {
    let value = document.get(&field.name);
    let mut input_name = format!("{}[{}]", prefix, field.name);
    if field.field_type == FieldType::Select && field.multiple {
        input_name.push_str("[]");
    }

    let mut out = Map::new();
    out.insert("field_name".into(), json!(field.name));
    out.insert("type".into(), json!(field.field_type.as_str()));
    out.insert("label".into(), json!(field.label));
    out.insert("wrap".into(), json!(field.wrap));
    out.insert("required".into(), json!(field.required));
    out.insert("input_name".into(), json!(input_name));
    out.insert("input_value".into(), display_value(&field.field_type, value));
    out.insert("input_attributes".into(), json!(field.input_attributes));

    match field.field_type {
        FieldType::Select => {
            out.insert("multiple".into(), json!(field.multiple));
            out.insert(
                "select_options".into(),
                JsonValue::Array(select_options(document, field, value)),
            );
        }
        FieldType::List => {
            let item_prefix = format!("{}[{}][]", prefix, field.name);
            let items = document
                .nested(&field.name)
                .iter()
                .map(|child| {
                    let fields: Vec<JsonValue> = child
                        .schema()
                        .fields()
                        .iter()
                        .filter(|f| f.form_field || f.field_type == FieldType::Id)
                        .map(|f| outcast_field(child, f, &item_prefix))
                        .collect();
                    json!({
                        "class_name": child.class_name(),
                        "label": child.schema().label(),
                        "fields": fields,
                    })
                })
                .collect();
            out.insert("class_name".into(), json!(field.class_name));
            out.insert("items".into(), JsonValue::Array(items));
        }
        FieldType::Attachment => {
            let (url, variations) = match document.attachment(&field.name) {
                Ok(attachment) => {
                    let variations: Map<String, JsonValue> = field
                        .variations
                        .iter()
                        .filter_map(|v| {
                            attachment
                                .url(v.name())
                                .map(|url| (v.name().to_string(), json!(url)))
                        })
                        .collect();
                    (json!(attachment.url(ORIGINAL)), variations)
                }
                Err(_) => (JsonValue::Null, Map::new()),
            };
            out.insert("url".into(), url);
            out.insert("variations".into(), JsonValue::Object(variations));
        }
        _ => {}
    }
    JsonValue::Object(out)
}

fn display_value(field_type: &FieldType, value: &Value) -> JsonValue {
    match (field_type, value) {
        (FieldType::Price, Value::Int(cents)) => json!(format_price(*cents)),
        (_, Value::Date(date)) => json!(date.format("%d/%m/%Y").to_string()),
        (_, Value::DateTime(dt)) => json!(dt.format("%d/%m/%Y %H:%M:%S").to_string()),
        _ => value.to_json(),
    }
}

/// `4257` -> `42.57`
pub fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

fn select_options(document: &Document, field: &FieldDescriptor, value: &Value) -> Vec<JsonValue> {
    let options: Vec<SelectOption> = field
        .select_options
        .as_ref()
        .map(|options| options.resolve(document))
        .unwrap_or_default();
    let selected: Vec<&str> = match value {
        Value::Text(s) => vec![s.as_str()],
        Value::List(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let render = |option: &SelectOption| {
        json!({
            "description": option.description,
            "value": option.value,
            "selected": selected.contains(&option.value.as_str()),
        })
    };

    if field.multiple && field.ordered {
        let chosen = selected
            .iter()
            .filter_map(|v| options.iter().find(|o| o.value == *v));
        let rest = options
            .iter()
            .filter(|o| !selected.contains(&o.value.as_str()));
        chosen.chain(rest).map(render).collect()
    } else {
        options.iter().map(render).collect()
    }
}
