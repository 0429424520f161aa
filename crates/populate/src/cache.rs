//! Per-class cache of distinct field values (used to fill dropdowns).
//!
//! Each schema owns one cache. Entries are computed lazily from the backend
//! and dropped wholesale by [`DistinctCache::invalidate`], which the built-in
//! `after_save` and `after_delete` hooks call. Recomputing is side-effect
//! free, so a racing recomputation only costs time.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct DistinctCache {
    entries: RwLock<HashMap<String, Vec<Value>>>,
}

impl DistinctCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_try_insert_with<F>(&self, field: &str, compute: F) -> Result<Vec<Value>>
    where
        F: FnOnce() -> Result<Vec<Value>>,
    {
        if let Some(values) = self.entries.read().get(field) {
            return Ok(values.clone());
        }
        let values = compute()?;
        self.entries
            .write()
            .insert(field.to_string(), values.clone());
        Ok(values)
    }

    pub fn is_cached(&self, field: &str) -> bool {
        self.entries.read().contains_key(field)
    }

    pub fn invalidate(&self) {
        self.entries.write().clear();
    }
}
