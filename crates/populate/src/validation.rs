//! # Validation
//!
//! [`Document::is_valid`] runs, in order:
//!
//! 1. the `before_validate` hooks,
//! 2. a reset of the document's [`ErrorMap`],
//! 3. the class validator (which reports through [`Document::error_on`]),
//! 4. the `after_validate` hooks,
//! 5. validation of every nested document.
//!
//! The result is true only if the document and all nested documents are
//! error free. Nested documents are always all validated, so
//! [`Document::error_report`] can show the whole error tree:
//!
//! ```text
//! { "title": ["Is required"], "tracks": [ {}, { "length": ["Too long"] } ] }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::document::Document;
use crate::error::Result;
use crate::repository::Context;

/// Field name to ordered error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMap {
    errors: BTreeMap<String, Vec<String>>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message; earlier messages for the field are kept.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn to_json(&self) -> Map<String, JsonValue> {
        self.errors
            .iter()
            .map(|(field, messages)| {
                let messages = messages.iter().cloned().map(JsonValue::String).collect();
                (field.clone(), JsonValue::Array(messages))
            })
            .collect()
    }
}

impl Document {
    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn error_on(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn is_valid(&mut self, cx: &Context<'_>) -> Result<bool> {
        self.exec_callback("before_validate", cx)?;
        self.errors.clear();
        if let Some(validator) = self.schema.validator().map(Arc::clone) {
            validator(self);
        }
        self.exec_callback("after_validate", cx)?;

        let mut valid = self.errors.is_empty();
        for children in self.nested.values_mut() {
            for child in children.iter_mut() {
                valid = child.is_valid(cx)? && valid;
            }
        }
        Ok(valid)
    }

    /// Own errors plus, for every nested list field, one report per child.
    pub fn error_report(&self) -> JsonValue {
        let mut report = self.errors.to_json();
        for field in self.schema.nested_list_fields() {
            let children = self
                .nested
                .get(&field.name)
                .map(|docs| docs.iter().map(Document::error_report).collect())
                .unwrap_or_default();
            report.insert(field.name.clone(), JsonValue::Array(children));
        }
        JsonValue::Object(report)
    }
}
