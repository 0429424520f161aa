use crate::naming::{foreign_key_for, guess_class_name, label_for};

/// Options given when declaring a relationship. Unset values are guessed
/// from the owning class and the relationship name.
#[derive(Debug, Clone, Default)]
pub struct RelationshipOptions {
    pub class_name: Option<String>,
    pub foreign_key: Option<String>,
    pub dependent: Option<bool>,
    pub label: Option<String>,
}

impl RelationshipOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn dependent(mut self, dependent: bool) -> Self {
        self.dependent = Some(dependent);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A referential link to documents of another class.
///
/// Related documents are not embedded: they are found on demand by matching
/// their `foreign_key` field against the owner's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub class_name: String,
    pub foreign_key: String,
    /// Related documents are deleted along with the owner
    pub dependent: bool,
    pub label: String,
}

impl RelationshipDescriptor {
    pub(crate) fn resolve(owner: &str, name: &str, options: RelationshipOptions) -> Self {
        Self {
            name: name.to_string(),
            class_name: options
                .class_name
                .unwrap_or_else(|| guess_class_name(owner, name)),
            foreign_key: options
                .foreign_key
                .unwrap_or_else(|| foreign_key_for(owner)),
            dependent: options.dependent.unwrap_or(true),
            label: options.label.unwrap_or_else(|| label_for(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_guessed_from_owner() {
        let rel = RelationshipDescriptor::resolve("Blog::Article", "comments", RelationshipOptions::new());
        assert_eq!(rel.class_name, "Blog::Comment");
        assert_eq!(rel.foreign_key, "article_id");
        assert!(rel.dependent);
        assert_eq!(rel.label, "Comments");
    }

    #[test]
    fn explicit_options_win() {
        let rel = RelationshipDescriptor::resolve(
            "Blog::Article",
            "notes",
            RelationshipOptions::new()
                .class_name("Memo")
                .foreign_key("post_id")
                .dependent(false),
        );
        assert_eq!(rel.class_name, "Memo");
        assert_eq!(rel.foreign_key, "post_id");
        assert!(!rel.dependent);
    }
}
