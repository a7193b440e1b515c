//! Applying resolved attributes to a declaration table.

use toml_edit::{Array, Item, Table, Value};

/// Value-only result of upgrading one dependency.
///
/// Produced by a task without touching any document; the orchestrator applies
/// every set in a single pass once the whole batch succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttributes {
    pub name: String,
    /// Lowercase hex SHA-256 of the archive
    pub sha256: String,
    /// Top-level directory inside the archive, empty for release assets
    pub strip_prefix: String,
    /// Mirror URL first, upstream URL second
    pub urls: [String; 2],
    /// Written as the comment above `urls`
    pub annotation: String,
}

/// Rewrites `sha256`, `strip_prefix` and `urls` in `table`.
///
/// Missing keys are inserted. Existing values keep their surrounding
/// whitespace. The comment block above `urls` is replaced by
/// `# <annotation>`, keeping the key's indentation.
pub fn apply(table: &mut Table, attrs: &ResolvedAttributes) {
    set_string(table, "sha256", &attrs.sha256);
    set_string(table, "strip_prefix", &attrs.strip_prefix);

    let indent = table
        .key("urls")
        .and_then(|key| key.leaf_decor().prefix())
        .and_then(|prefix| prefix.as_str())
        .map(|prefix| prefix.rsplit('\n').next().unwrap_or_default().to_string())
        .unwrap_or_default();

    table.insert("urls", Item::Value(Value::Array(url_array(&attrs.urls))));
    if let Some(mut key) = table.key_mut("urls") {
        key.leaf_decor_mut().set_prefix(format!("{indent}# {}\n{indent}", attrs.annotation));
    }
}

fn set_string(table: &mut Table, key: &str, new_value: &str) {
    match table.get_mut(key).and_then(Item::as_value_mut) {
        Some(existing) => {
            let decor = existing.decor().clone();
            *existing = Value::from(new_value);
            *existing.decor_mut() = decor;
        }
        None => {
            table.insert(key, toml_edit::value(new_value));
        }
    }
}

/// One URL per line with a trailing comma.
fn url_array(urls: &[String; 2]) -> Array {
    let mut array = Array::new();
    for url in urls {
        let mut value = Value::from(url.as_str());
        value.decor_mut().set_prefix("\n    ");
        array.push_formatted(value);
    }
    array.set_trailing_comma(true);
    array.set_trailing("\n");
    array
}
