//! Persistence lifecycle and built-in hooks.
//!
//! Event order for a successful save:
//!
//! ```text
//! is_valid -> before_save -> before_create | before_update
//!          -> backend write
//!          -> after_create | after_update -> after_save
//! ```
//!
//! and for a delete:
//!
//! ```text
//! before_delete -> backend delete -> after_delete
//! ```
//!
//! Every schema starts with the hooks installed by [`install`]; user hooks
//! registered afterwards run after them unless prepended.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use super::Document;
use crate::callbacks::{Callback, CallbackRegistry, RECURSIVE_EVENTS};
use crate::error::{PopulateError, Result};
use crate::repository::Context;
use crate::value::Value;

/// Registers the built-in hooks every document class carries.
pub(crate) fn install(callbacks: &mut CallbackRegistry) {
    for event in RECURSIVE_EVENTS {
        callbacks.before(event, Callback::RecurseNested);
        callbacks.after(event, Callback::RecurseNested);
    }
    callbacks.before("create", Callback::hook(ensure_id));
    callbacks.before("create", Callback::hook(ensure_positions));
    callbacks.after("create", Callback::hook(mark_persisted));
    callbacks.after("save", Callback::hook(take_snapshot));
    callbacks.after("save", Callback::hook(invalidate_cache));
    callbacks.before("delete", Callback::hook(delete_dependents));
    callbacks.before("delete", Callback::hook(delete_attachments));
    callbacks.after("delete", Callback::hook(mark_detached));
    callbacks.after("delete", Callback::hook(invalidate_cache));
}

impl Document {
    /// Validates and persists the document.
    ///
    /// Returns `Ok(None)` when validation fails; the errors are then on the
    /// document. Otherwise returns the id the document was stored under.
    pub fn save(&mut self, cx: &Context<'_>) -> Result<Option<String>> {
        if !self.is_valid(cx)? {
            debug!(
                "{} not saved: {} invalid field(s)",
                self.class_name(),
                self.errors.len()
            );
            return Ok(None);
        }
        self.exec_callback("before_save", cx)?;
        let id = if self.is_new {
            self.perform_create(cx)?
        } else {
            self.perform_update(cx)?
        };
        self.exec_callback("after_save", cx)?;
        Ok(Some(id))
    }

    fn perform_create(&mut self, cx: &Context<'_>) -> Result<String> {
        self.exec_callback("before_create", cx)?;
        let id = cx.backend().perform_create(&self.schema, &self.to_h())?;
        self.exec_callback("after_create", cx)?;
        info!("Created {} {}", self.class_name(), id);
        Ok(id)
    }

    fn perform_update(&mut self, cx: &Context<'_>) -> Result<String> {
        let id = self
            .id()
            .map(str::to_string)
            .ok_or_else(|| PopulateError::missing_document(self.class_name(), None))?;
        self.exec_callback("before_update", cx)?;
        cx.backend()
            .perform_update(&self.schema, &id, &self.to_h())?;
        self.exec_callback("after_update", cx)?;
        debug!("Updated {} {}", self.class_name(), id);
        Ok(id)
    }

    /// Removes the stored record, its dependents and its attachment files.
    pub fn delete(&mut self, cx: &Context<'_>) -> Result<()> {
        let id = self
            .id()
            .map(str::to_string)
            .ok_or_else(|| PopulateError::missing_document(self.class_name(), None))?;
        if cx.backend().find(&self.schema, &id)?.is_none() {
            return Err(PopulateError::missing_document(self.class_name(), Some(&id)));
        }
        self.exec_callback("before_delete", cx)?;
        cx.backend().perform_delete(&self.schema, &id)?;
        self.exec_callback("after_delete", cx)?;
        info!("Deleted {} {}", self.class_name(), id);
        Ok(())
    }
}

fn ensure_id(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    if doc.id().is_none() {
        let id_field = doc.schema.id_field().to_string();
        doc.values
            .insert(id_field, Value::Text(Uuid::new_v4().to_string()));
    }
    Ok(())
}

/// Unset position fields go after the last document of their scope.
///
/// Reads the backend directly: the distinct-value cache lives on the schema
/// and is shared by every backend the registry is used with.
fn ensure_positions(doc: &mut Document, cx: &Context<'_>, _event: &str) -> Result<()> {
    let schema = Arc::clone(&doc.schema);
    let mut stored = None;
    for field in schema.position_fields() {
        if !doc.get(&field.name).is_null() {
            continue;
        }
        if stored.is_none() {
            stored = Some(cx.backend().documents(&schema)?);
        }
        let scope_value = field.scope.as_ref().map(|scope| doc.get(scope).to_json());
        let existing = stored
            .iter()
            .flatten()
            .filter(|record| match (&field.scope, &scope_value) {
                (Some(scope), Some(value)) => {
                    record.get(scope).unwrap_or(&serde_json::Value::Null) == value
                }
                _ => true,
            })
            .filter_map(|record| record.get(&field.name).and_then(serde_json::Value::as_i64))
            .max();
        let next = existing.map_or(0, |max| max + 1);
        doc.values.insert(field.name.clone(), Value::Int(next));
    }
    Ok(())
}

fn mark_persisted(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    doc.is_new = false;
    Ok(())
}

fn take_snapshot(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    doc.snapshot = Some(doc.to_h());
    Ok(())
}

fn invalidate_cache(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    doc.schema.cache().invalidate();
    Ok(())
}

fn delete_dependents(doc: &mut Document, cx: &Context<'_>, _event: &str) -> Result<()> {
    let Some(id) = doc.id().map(str::to_string) else {
        return Ok(());
    };
    let schema = Arc::clone(&doc.schema);
    for relationship in schema.relationships().iter().filter(|r| r.dependent) {
        let dependents = cx.find_by(
            &relationship.class_name,
            &relationship.foreign_key,
            &Value::Text(id.clone()),
        )?;
        for mut dependent in dependents {
            debug!(
                "Deleting dependent {} of {} {}",
                dependent.class_name(),
                schema.class_name(),
                id
            );
            dependent.delete(cx)?;
        }
    }
    Ok(())
}

fn delete_attachments(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    for field in doc.schema.attachment_fields() {
        doc.attachment(&field.name)?.delete_all()?;
    }
    Ok(())
}

fn mark_detached(doc: &mut Document, _cx: &Context<'_>, _event: &str) -> Result<()> {
    doc.is_new = true;
    doc.snapshot = None;
    Ok(())
}

/// Timestamp hook for `datetime` fields that should track the last save,
/// e.g. `.before("save", touch("updated_at"))`.
pub fn touch(
    field: &str,
) -> impl Fn(&mut Document, &Context<'_>, &str) -> Result<()> + Send + Sync + 'static {
    let field = field.to_string();
    move |doc, _cx, _event| {
        doc.set(&field, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::repository::Repository;
    use crate::schema::{FieldOptions, FieldType, RelationshipOptions};
    use crate::store::MemBackend;
    use crate::test_utils::fixtures;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn save_assigns_id_and_snapshot() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "Blue");
        assert!(album.is_dirty());

        let id = repo.save(&mut album).unwrap().unwrap();
        assert_eq!(album.id(), Some(id.as_str()));
        assert!(!album.is_new());
        assert!(!album.is_dirty());

        album.set("title", "Blue (Remastered)");
        assert!(album.is_dirty());
    }

    #[test]
    fn callbacks_fire_in_lifecycle_order() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        let mut builder = registry.define("Note").field("body", FieldOptions::string());
        for event in ["save", "create", "update", "delete", "validate"] {
            for hook in [crate::callbacks::before(event), crate::callbacks::after(event)] {
                let log = Arc::clone(&events);
                builder = builder.register_callback(
                    &hook,
                    Callback::hook(move |_, _, name| {
                        log.lock().unwrap().push(name.to_string());
                        Ok(())
                    }),
                    crate::callbacks::Placement::Append,
                );
            }
        }
        builder.build().unwrap();
        let registry = Arc::new(registry);
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());

        let mut note = repo.build("Note").unwrap();
        repo.save(&mut note).unwrap();
        repo.save(&mut note).unwrap();
        repo.delete(&mut note).unwrap();

        let expected = [
            "before_validate",
            "after_validate",
            "before_save",
            "before_create",
            "after_create",
            "after_save",
            "before_validate",
            "after_validate",
            "before_save",
            "before_update",
            "after_update",
            "after_save",
            "before_delete",
            "after_delete",
        ];
        assert_eq!(*events.lock().unwrap(), expected);
    }

    #[test]
    fn positions_count_up_per_scope() {
        let mut registry = Registry::new();
        registry
            .define("Slide")
            .field("deck", FieldOptions::string())
            .field(
                "position",
                FieldOptions::new(FieldType::Position).scope("deck"),
            )
            .build()
            .unwrap();
        let registry = Arc::new(registry);
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());

        let mut positions = Vec::new();
        for deck in ["a", "a", "b", "a"] {
            let mut slide = repo.build("Slide").unwrap();
            slide.set("deck", deck);
            repo.save(&mut slide).unwrap();
            positions.push(slide.get("position").as_int());
        }
        assert_eq!(positions, vec![Some(0), Some(1), Some(0), Some(2)]);
    }

    #[test]
    fn unscoped_positions_see_fresh_values() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        for expected in 0..3 {
            let mut album = fixtures::album(&registry, "Any");
            repo.save(&mut album).unwrap();
            assert_eq!(album.get("position"), &Value::Int(expected));
        }
    }

    #[test]
    fn positions_ignore_other_backends_sharing_the_registry() {
        let mut registry = Registry::new();
        registry
            .define("Slide")
            .field("title", FieldOptions::string())
            .field("position", FieldOptions::new(FieldType::Position))
            .build()
            .unwrap();
        let registry = Arc::new(registry);
        let busy = Repository::new(Arc::clone(&registry), MemBackend::new());
        for _ in 0..3 {
            let mut slide = busy.build("Slide").unwrap();
            busy.save(&mut slide).unwrap();
        }
        assert_eq!(busy.distinct_values("Slide", "position").unwrap().len(), 3);

        let empty = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut slide = empty.build("Slide").unwrap();
        empty.save(&mut slide).unwrap();
        assert_eq!(slide.get("position"), &Value::Int(0));

        let mut next = busy.build("Slide").unwrap();
        busy.save(&mut next).unwrap();
        assert_eq!(next.get("position"), &Value::Int(3));
    }

    #[test]
    fn explicit_position_is_kept() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "Any");
        album.set("position", Value::Int(7));
        repo.save(&mut album).unwrap();
        assert_eq!(album.get("position"), &Value::Int(7));
    }

    #[test]
    fn invalid_document_is_not_persisted() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "");

        assert_eq!(repo.save(&mut album).unwrap(), None);
        assert_eq!(album.errors().get("title"), ["Is required"]);
        assert!(album.is_new());
        assert!(repo.all("Music::Album").unwrap().is_empty());

        album.set("title", "Hejira");
        assert!(repo.save(&mut album).unwrap().is_some());
        assert!(album.errors().is_empty());
    }

    #[test]
    fn update_without_id_is_missing_document() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "Blue");
        album.is_new = false;
        let result = repo.save(&mut album);
        assert!(matches!(
            result,
            Err(PopulateError::MissingDocument { id: None, .. })
        ));
    }

    #[test]
    fn delete_of_unsaved_document_fails() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "Blue");
        assert!(matches!(
            repo.delete(&mut album),
            Err(PopulateError::MissingDocument { .. })
        ));

        album.set("id", "ghost");
        assert!(matches!(
            repo.delete(&mut album),
            Err(PopulateError::MissingDocument { id: Some(_), .. })
        ));
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let mut registry = Registry::new();
        registry
            .define("Blog::Comment")
            .field("article_id", FieldOptions::new(FieldType::Hidden))
            .field("body", FieldOptions::string())
            .build()
            .unwrap();
        registry
            .define("Blog::Article")
            .field("title", FieldOptions::string())
            .relationship("comments", RelationshipOptions::new())
            .build()
            .unwrap();
        let registry = Arc::new(registry);
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());

        let mut article = repo.build("Blog::Article").unwrap();
        let article_id = repo.save(&mut article).unwrap().unwrap();
        let mut other = repo.build("Blog::Article").unwrap();
        let other_id = repo.save(&mut other).unwrap().unwrap();
        for parent in [&article_id, &article_id, &other_id] {
            let mut comment = repo.build("Blog::Comment").unwrap();
            comment.set("article_id", parent.as_str());
            repo.save(&mut comment).unwrap();
        }
        assert_eq!(repo.related(&article, "comments").unwrap().len(), 2);

        repo.delete(&mut article).unwrap();
        assert!(article.is_new());
        assert!(repo.related(&article, "comments").unwrap().is_empty());
        assert_eq!(repo.all("Blog::Comment").unwrap().len(), 1);
        assert!(repo.get("Blog::Article", &article_id).unwrap().is_none());
    }

    #[test]
    fn nested_documents_get_ids_on_create() {
        let registry = Arc::new(fixtures::registry());
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut album = fixtures::album(&registry, "Blue");
        album
            .push_nested("tracks", fixtures::track(&registry, "River"))
            .unwrap();
        repo.save(&mut album).unwrap();

        let track = &album.nested("tracks")[0];
        assert!(track.id().is_some());
        assert!(!track.is_new());
    }

    #[test]
    fn touch_sets_timestamp() {
        let mut registry = Registry::new();
        registry
            .define("Page")
            .field("updated_at", FieldOptions::new(FieldType::Datetime))
            .before("save", touch("updated_at"))
            .build()
            .unwrap();
        let registry = Arc::new(registry);
        let repo = Repository::new(Arc::clone(&registry), MemBackend::new());
        let mut page = repo.build("Page").unwrap();
        repo.save(&mut page).unwrap();
        assert!(matches!(page.get("updated_at"), Value::DateTime(_)));
    }
}
