//! # Typecasting
//!
//! Converts raw wire values (form strings, JSON scalars and arrays) into the
//! typed [`Value`] of a field. Dispatch is a plain `match` on [`FieldType`];
//! custom types dispatch to the [`Typecaster`] registered for them.
//!
//! Typecasting never fails on bad user input: anything that cannot be read
//! degrades to [`Value::Null`] and it is up to validation to complain.
//!
//! | Type | Accepts | Result |
//! |------|---------|--------|
//! | any (except attachment) | `null`, blank string | `Null` |
//! | `integer`, `position` | leading numeric prefix (`"42.50"`) | `Int(42)` (truncated) |
//! | `price` | amount with noise (`"$ 1,234.567"`) | `Int(123457)` cents (rounded) |
//! | `boolean` | `"true"` / `true` | `Bool(true)`, anything else `Bool(false)` |
//! | `date` | `dd/mm/yyyy`, `yyyy-mm-dd` (`/` or `-`) | `Date`, malformed `Null` |
//! | `datetime` | `dd/mm/yyyy hh:mm:ss` (`/` or `-`) | `DateTime` (UTC), malformed `Null` |
//! | `select` + multiple | array, `"nil"` sentinel dropped | `List` |
//! | custom without typecaster | `"true"`, `"false"`, other | guessed |
//!
//! Attachment fields are not typecast here: the document routes them through
//! the attachment pipeline.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::schema::{FieldDescriptor, FieldType};
use crate::value::Value;

/// Typecast for a custom field type.
pub type Typecaster = Arc<dyn Fn(&FieldDescriptor, &JsonValue) -> Value + Send + Sync>;

/// Forms submit this value so that an empty multi-select still sends its field.
pub const MULTIPLE_SELECT_SENTINEL: &str = "nil";

static NUMERIC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([-+]?\d+(?:\.\d+)?)").expect("valid regex"));
static PRICE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^-0-9.]").expect("valid regex"));
static DATE_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})[/-](\d{2})[/-](\d{4})$").expect("valid regex"));
static DATE_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[/-](\d{2})[/-](\d{2})$").expect("valid regex"));
static DATETIME_DMY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})[/-](\d{2})[/-](\d{4}) (\d{2}):(\d{2}):(\d{2})$").expect("valid regex")
});

pub fn is_blank(raw: &JsonValue) -> bool {
    match raw {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub fn typecast(field: &FieldDescriptor, raw: &JsonValue) -> Value {
    if is_blank(raw) {
        return Value::Null;
    }
    match &field.field_type {
        FieldType::String | FieldType::Text | FieldType::Hidden | FieldType::Id => {
            typecast_string(raw)
        }
        FieldType::Integer | FieldType::Position => typecast_integer(raw),
        FieldType::Price => typecast_price(raw),
        FieldType::Boolean => typecast_boolean(raw),
        FieldType::Date => typecast_date(raw),
        FieldType::Datetime => typecast_datetime(raw),
        FieldType::Select => typecast_select(field, raw),
        FieldType::List | FieldType::Attachment => Value::Raw(raw.clone()),
        FieldType::Custom(_) => match &field.typecaster {
            Some(typecaster) => typecaster(field, raw),
            None => typecast_guess(raw),
        },
    }
}

fn typecast_string(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => Value::Text(n.to_string()),
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        other => Value::Raw(other.clone()),
    }
}

fn typecast_integer(raw: &JsonValue) -> Value {
    let number = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => NUMERIC_PREFIX
            .captures(s)
            .and_then(|caps| caps[1].parse::<f64>().ok()),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Value::Int(n.trunc() as i64),
        _ => Value::Null,
    }
}

fn typecast_price(raw: &JsonValue) -> Value {
    let amount = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => PRICE_NOISE.replace_all(s, "").parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        Some(a) if a.is_finite() => {
            let rounded = (a * 100.0).round() / 100.0;
            Value::Int((rounded * 100.0).round() as i64)
        }
        _ => Value::Null,
    }
}

fn typecast_boolean(raw: &JsonValue) -> Value {
    let truthy = match raw {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s == "true",
        _ => false,
    };
    Value::Bool(truthy)
}

fn typecast_date(raw: &JsonValue) -> Value {
    let Some(s) = raw.as_str().map(str::trim) else {
        return Value::Null;
    };
    let ymd = if let Some(caps) = DATE_DMY.captures(s) {
        (caps[3].parse().ok(), caps[2].parse().ok(), caps[1].parse().ok())
    } else if let Some(caps) = DATE_YMD.captures(s) {
        (caps[1].parse().ok(), caps[2].parse().ok(), caps[3].parse().ok())
    } else {
        return Value::Null;
    };
    match ymd {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(Value::Date)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn typecast_datetime(raw: &JsonValue) -> Value {
    let Some(caps) = raw.as_str().and_then(|s| DATETIME_DMY.captures(s.trim())) else {
        return Value::Null;
    };
    let part = |i: usize| caps[i].parse::<u32>().ok();
    let year = caps[3].parse::<i32>().ok();
    match (year, part(2), part(1), part(4), part(5), part(6)) {
        (Some(y), Some(mo), Some(d), Some(h), Some(mi), Some(s)) => Utc
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn typecast_select(field: &FieldDescriptor, raw: &JsonValue) -> Value {
    if !field.multiple {
        return typecast_string(raw);
    }
    let items: Vec<&JsonValue> = match raw {
        JsonValue::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    Value::List(
        items
            .into_iter()
            .filter(|item| item.as_str() != Some(MULTIPLE_SELECT_SENTINEL))
            .map(typecast_string)
            .collect(),
    )
}

/// Best guess for values of a type nobody registered a typecast for.
pub fn typecast_guess(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::String(s) if s == "true" => Value::Bool(true),
        JsonValue::String(s) if s == "false" => Value::Bool(false),
        JsonValue::String(s) if s.is_empty() => Value::Null,
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => n.as_i64().map(Value::Int).unwrap_or_else(|| Value::Raw(raw.clone())),
        JsonValue::Null => Value::Null,
        other => Value::Raw(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldOptions;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn field(field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor::resolve("f", FieldOptions::new(field_type))
    }

    fn cast(field_type: FieldType, raw: JsonValue) -> Value {
        typecast(&field(field_type), &raw)
    }

    #[test]
    fn blank_input_is_null_for_every_type() {
        for t in [
            FieldType::String,
            FieldType::Integer,
            FieldType::Price,
            FieldType::Boolean,
            FieldType::Date,
            FieldType::Select,
        ] {
            assert_eq!(cast(t.clone(), json!("")), Value::Null, "{}", t);
            assert_eq!(cast(t.clone(), json!("   ")), Value::Null, "{}", t);
            assert_eq!(cast(t, JsonValue::Null), Value::Null);
        }
    }

    #[test]
    fn price_is_stored_in_cents() {
        assert_eq!(cast(FieldType::Price, json!("42")), Value::Int(4200));
        assert_eq!(cast(FieldType::Price, json!("42.567")), Value::Int(4257));
        assert_eq!(cast(FieldType::Price, json!("$ 1,234.50")), Value::Int(123450));
        assert_eq!(cast(FieldType::Price, json!("-3.1")), Value::Int(-310));
        assert_eq!(cast(FieldType::Price, json!(19.99)), Value::Int(1999));
        assert_eq!(cast(FieldType::Price, json!("free")), Value::Null);
    }

    #[test]
    fn integer_truncates() {
        assert_eq!(cast(FieldType::Integer, json!("42.50")), Value::Int(42));
        assert_eq!(cast(FieldType::Integer, json!("42.999")), Value::Int(42));
        assert_eq!(cast(FieldType::Integer, json!("-7.9")), Value::Int(-7));
        assert_eq!(cast(FieldType::Integer, json!("12 apples")), Value::Int(12));
        assert_eq!(cast(FieldType::Integer, json!(3.7)), Value::Int(3));
        assert_eq!(cast(FieldType::Integer, json!("apples")), Value::Null);
        assert_eq!(cast(FieldType::Position, json!("5")), Value::Int(5));
    }

    #[test]
    fn boolean_only_true_is_true() {
        assert_eq!(cast(FieldType::Boolean, json!("true")), Value::Bool(true));
        assert_eq!(cast(FieldType::Boolean, json!(true)), Value::Bool(true));
        assert_eq!(cast(FieldType::Boolean, json!("false")), Value::Bool(false));
        assert_eq!(cast(FieldType::Boolean, json!("yes")), Value::Bool(false));
        assert_eq!(cast(FieldType::Boolean, json!(1)), Value::Bool(false));
    }

    #[test]
    fn dates_in_both_orders() {
        let expected = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(cast(FieldType::Date, json!("09/03/2024")), expected);
        assert_eq!(cast(FieldType::Date, json!("09-03-2024")), expected);
        assert_eq!(cast(FieldType::Date, json!("2024-03-09")), expected);
        assert_eq!(cast(FieldType::Date, json!("2024/03/09")), expected);
    }

    #[test]
    fn malformed_dates_are_null() {
        assert_eq!(cast(FieldType::Date, json!("9/3/2024")), Value::Null);
        assert_eq!(cast(FieldType::Date, json!("31/02/2024")), Value::Null);
        assert_eq!(cast(FieldType::Date, json!("tomorrow")), Value::Null);
        assert_eq!(cast(FieldType::Date, json!("2024-03-09 extra")), Value::Null);
    }

    #[test]
    fn datetimes_are_utc() {
        match cast(FieldType::Datetime, json!("09-03-2024 14:05:30")) {
            Value::DateTime(dt) => {
                assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 9));
                assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 5, 30));
            }
            other => panic!("Expected DateTime, got {:?}", other),
        }
        assert_eq!(
            cast(FieldType::Datetime, json!("09/03/2024 25:00:00")),
            Value::Null
        );
        assert_eq!(cast(FieldType::Datetime, json!("09/03/2024")), Value::Null);
    }

    #[test]
    fn multiple_select_drops_sentinel() {
        let f = FieldDescriptor::resolve("tags", FieldOptions::new(FieldType::Select).multiple());
        assert_eq!(typecast(&f, &json!(["nil"])), Value::List(vec![]));
        assert_eq!(
            typecast(&f, &json!(["nil", "a", "b"])),
            Value::List(vec![Value::text("a"), Value::text("b")])
        );
        assert_eq!(typecast(&f, &json!("a")), Value::List(vec![Value::text("a")]));
    }

    #[test]
    fn single_select_keeps_string() {
        assert_eq!(cast(FieldType::Select, json!("red")), Value::text("red"));
    }

    #[test]
    fn unregistered_custom_type_guesses() {
        let t = FieldType::Custom("color".into());
        assert_eq!(cast(t.clone(), json!("true")), Value::Bool(true));
        assert_eq!(cast(t.clone(), json!("false")), Value::Bool(false));
        assert_eq!(cast(t.clone(), json!("teal")), Value::text("teal"));
        assert_eq!(cast(t, json!(7)), Value::Int(7));
    }

    #[test]
    fn strings_pass_through() {
        assert_eq!(cast(FieldType::Text, json!(" spaced ")), Value::text(" spaced "));
        assert_eq!(cast(FieldType::String, json!(12)), Value::text("12"));
    }
}
