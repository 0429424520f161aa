//! Runtime representation of field values.
//!
//! Every declared field of a document holds a [`Value`]. Typecasting turns raw
//! wire input into a `Value`, [`Value::to_json`] turns it into the stored form
//! and [`Value::decode`] reads the stored form back, guided by the field type.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use crate::schema::FieldType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// Integers, positions and prices (in cents)
    Int(i64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Multi-select values
    List(Vec<Value>),
    /// Anything a custom type produced that has no dedicated variant
    Raw(JsonValue),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, whitespace-only text and empty lists are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Raw(v) => v.is_null(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Stored (serialized) form of the value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Raw(v) => v.clone(),
        }
    }

    /// Reads a stored value back for a field of the given type.
    ///
    /// Shapes that do not match the type are kept as [`Value::Raw`] so that
    /// decoding never loses data.
    pub fn decode(field_type: &FieldType, json: &JsonValue) -> Value {
        match (field_type, json) {
            (_, JsonValue::Null) => Value::Null,
            (_, JsonValue::Bool(b)) => Value::Bool(*b),
            (
                FieldType::Integer | FieldType::Price | FieldType::Position,
                JsonValue::Number(n),
            ) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Raw(json.clone()),
            },
            (FieldType::Date, JsonValue::String(s)) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .unwrap_or_else(|_| Value::Raw(json.clone())),
            (FieldType::Datetime, JsonValue::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| Value::Raw(json.clone())),
            (_, JsonValue::String(s)) => Value::Text(s.clone()),
            (FieldType::Select, JsonValue::Array(items)) => {
                Value::List(items.iter().map(|v| Value::decode(field_type, v)).collect())
            }
            (_, JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Raw(json.clone()),
            },
            _ => Value::Raw(json.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}
