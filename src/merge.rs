//! Layering of nested override documents.
//!
//! Override files passed with `--overrides` and the tiered engine
//! configuration are both nested documents. Later layers win field by field,
//! and every leaf remembers the layer it came from.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Nested document built from ordered layers, remembering which layer set
/// each leaf.
///
/// Objects merge key by key. A `null` in a layer leaves the current value
/// alone. Every other value, arrays included, replaces what was there and
/// takes over its origin, along with everything beneath it.
///
/// ```
/// use serde_json::json;
/// use settings_tree::merge::LayeredDocument;
///
/// let mut doc = LayeredDocument::new();
/// doc.push("base.yaml", json!({"runner": {"server": {"port": 8080, "host": "localhost"}}}));
/// doc.push("prod.yaml", json!({"runner": {"server": {"port": 9090}}}));
///
/// assert_eq!(doc.value(), &json!({"runner": {"server": {"port": 9090, "host": "localhost"}}}));
/// assert_eq!(doc.origin("runner.server.port"), Some(&"prod.yaml"));
/// assert_eq!(doc.origin("runner.server.host"), Some(&"base.yaml"));
/// ```
#[derive(Debug, Clone)]
pub struct LayeredDocument<L> {
    value: Value,
    origins: BTreeMap<String, L>,
}

impl<L: Clone> LayeredDocument<L> {
    pub fn new() -> Self {
        Self {
            value: Value::Null,
            origins: BTreeMap::new(),
        }
    }

    /// Apply `layer` above every layer pushed so far.
    pub fn push(&mut self, label: L, layer: Value) {
        let mut path = Vec::new();
        apply(&mut self.value, layer, &mut path, &label, &mut self.origins);
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Layer that set the leaf at `dotted`, if any.
    pub fn origin(&self, dotted: &str) -> Option<&L> {
        self.origins.get(dotted)
    }

    /// Every leaf that some layer set, by dotted path.
    pub fn origins(&self) -> &BTreeMap<String, L> {
        &self.origins
    }
}

impl<L: Clone> Default for LayeredDocument<L> {
    fn default() -> Self {
        Self::new()
    }
}

fn apply<L: Clone>(
    current: &mut Value,
    layer: Value,
    path: &mut Vec<String>,
    label: &L,
    origins: &mut BTreeMap<String, L>,
) {
    match layer {
        Value::Null => {}
        Value::Object(fields) => {
            if !current.is_object() {
                forget_below(origins, &path.join("."));
                *current = Value::Object(Map::new());
            }
            let Value::Object(merged) = current else {
                return;
            };
            for (name, value) in fields {
                path.push(name.clone());
                let slot = merged.entry(name).or_insert(Value::Null);
                apply(slot, value, path, label, origins);
                path.pop();
            }
        }
        leaf => {
            let dotted = path.join(".");
            forget_below(origins, &dotted);
            *current = leaf;
            origins.insert(dotted, label.clone());
        }
    }
}

/// Drop origins recorded at `dotted` or beneath it.
fn forget_below<L>(origins: &mut BTreeMap<String, L>, dotted: &str) {
    if dotted.is_empty() {
        origins.clear();
        return;
    }
    let nested = format!("{}.", dotted);
    origins.retain(|key, _| key != dotted && !key.starts_with(&nested));
}

/// Read a YAML (or JSON) document into a JSON value.
///
/// An empty file yields `null`, which leaves other layers untouched.
pub fn read_document(path: &Path) -> Result<Value, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&content).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
