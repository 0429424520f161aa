//! Name derivation helpers.
//!
//! Schemas derive a lot from names: field labels, foreign keys, the guessed
//! class of a relationship and the path prefix under which attachments of a
//! class are stored. These helpers keep those rules in one place.
//!
//! | Input | Helper | Output |
//! |-------|--------|--------|
//! | `first_name` | [`label_for`] | `First Name` |
//! | `Blog::BlogPost` | [`underscore`] | `blog/blog_post` |
//! | `Blog::Article`, `comments` | [`guess_class_name`] | `Blog::Comment` |
//! | `Blog::Article` | [`foreign_key_for`] | `article_id` |

const NAMESPACE_SEPARATOR: &str = "::";

/// Human label for a field name: separators become spaces, words are capitalized.
pub fn label_for(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Snake-cases a single CamelCase segment (`BlogPost` -> `blog_post`).
pub fn snake_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    let mut prev_lower = false;
    for ch in segment.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

/// Path form of a fully qualified class name (`Blog::BlogPost` -> `blog/blog_post`).
pub fn underscore(class_name: &str) -> String {
    class_name
        .split(NAMESPACE_SEPARATOR)
        .map(snake_case)
        .collect::<Vec<_>>()
        .join("/")
}

/// `blog_comment` -> `BlogComment`
pub fn camelize(name: &str) -> String {
    name.split('_').map(capitalize).collect()
}

pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix("sses") {
        format!("{}ss", stem)
    } else if word.ends_with("ss") {
        word.to_string()
    } else if let Some(stem) = word.strip_suffix('s') {
        stem.to_string()
    } else {
        word.to_string()
    }
}

/// Namespace part of a class name, if any (`Blog::Article` -> `Blog`).
pub fn namespace_of(class_name: &str) -> Option<&str> {
    class_name
        .rfind(NAMESPACE_SEPARATOR)
        .map(|idx| &class_name[..idx])
}

/// Last path segment of a class name (`Blog::Article` -> `Article`).
pub fn demodulize(class_name: &str) -> &str {
    match class_name.rfind(NAMESPACE_SEPARATOR) {
        Some(idx) => &class_name[idx + NAMESPACE_SEPARATOR.len()..],
        None => class_name,
    }
}

/// Class a relationship named `relationship` on `owner` most likely points to.
pub fn guess_class_name(owner: &str, relationship: &str) -> String {
    let class = camelize(&singularize(relationship));
    match namespace_of(owner) {
        Some(ns) => format!("{}{}{}", ns, NAMESPACE_SEPARATOR, class),
        None => class,
    }
}

pub fn foreign_key_for(owner: &str) -> String {
    format!("{}_id", snake_case(demodulize(owner)))
}

/// Reduces an uploaded filename to a safe base name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let mut cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    if cleaned.is_empty() || cleaned == "." {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Whether `filename` can be used as a stored attachment name: a single path
/// component that [`sanitize_filename`] leaves unchanged.
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.contains("..") && sanitize_filename(filename) == filename
}
