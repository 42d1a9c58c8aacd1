//! Immutable resolution results.

use super::node::display_name;
use super::value::Value;
use crate::error::ExtractError;
use crate::paths::SettingsPath;
use crate::sources::SourceKind;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Canonical key the value was looked up under.
    pub key: String,
    pub kind: SourceKind,
    /// Human-readable source name, e.g. the dotenv file path.
    pub source: String,
}

/// A leaf value with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedValue {
    pub value: Value,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEntry {
    Value(ResolvedValue),
    Node(ResolvedSettings),
}

/// Snapshot of one settings tree after resolution.
///
/// Mirrors the shape of the resolved [`SettingsNode`](super::SettingsNode).
/// There are no mutators: a reload produces a new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    name: String,
    entries: Vec<(String, ResolvedEntry)>,
}

/// One key whose value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingChange {
    pub path: String,
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl ResolvedSettings {
    pub(crate) fn new(name: String, entries: Vec<(String, ResolvedEntry)>) -> Self {
        Self { name, entries }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ResolvedEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    fn entry(&self, name: &str) -> Option<&ResolvedEntry> {
        self.entries
            .iter()
            .find_map(|(n, e)| (n == name).then_some(e))
    }

    /// Nested group by name.
    pub fn child(&self, name: &str) -> Option<&ResolvedSettings> {
        match self.entry(name)? {
            ResolvedEntry::Node(node) => Some(node),
            ResolvedEntry::Value(_) => None,
        }
    }

    /// Leaf at a dotted path relative to this node, e.g. `server.port`.
    pub fn lookup(&self, dotted: &str) -> Option<&ResolvedValue> {
        let path = SettingsPath::parse_dotted(dotted);
        let (last, parents) = path.segments().split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.child(segment)?;
        }
        match node.entry(last)? {
            ResolvedEntry::Value(v) => Some(v),
            ResolvedEntry::Node(_) => None,
        }
    }

    pub fn get(&self, dotted: &str) -> Option<&Value> {
        self.lookup(dotted).map(|v| &v.value)
    }

    pub fn get_bool(&self, dotted: &str) -> Option<bool> {
        self.get(dotted)?.as_bool()
    }

    pub fn get_i64(&self, dotted: &str) -> Option<i64> {
        self.get(dotted)?.as_i64()
    }

    pub fn get_f64(&self, dotted: &str) -> Option<f64> {
        self.get(dotted)?.as_f64()
    }

    pub fn get_str(&self, dotted: &str) -> Option<&str> {
        self.get(dotted)?.as_str()
    }

    /// Every leaf with its dotted path relative to this node.
    pub fn flatten(&self) -> Vec<(String, &ResolvedValue)> {
        let mut out = Vec::new();
        self.flatten_into(&SettingsPath::root(), &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, path: &SettingsPath, out: &mut Vec<(String, &'a ResolvedValue)>) {
        for (name, entry) in &self.entries {
            let child = path.child(name);
            match entry {
                ResolvedEntry::Value(v) => out.push((child.to_string(), v)),
                ResolvedEntry::Node(node) => node.flatten_into(&child, out),
            }
        }
    }

    /// Nested JSON object mirroring the tree.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, entry)| {
                let value = match entry {
                    ResolvedEntry::Value(v) => v.value.to_json(),
                    ResolvedEntry::Node(node) => node.to_json(),
                };
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Convert into a statically typed settings struct.
    ///
    /// ```ignore
    /// let runner: RunnerSettings = resolved.child("runner").unwrap().extract()?;
    /// ```
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        serde_json::from_value(self.to_json()).map_err(|source| ExtractError {
            node: display_name(&self.name),
            source,
        })
    }

    /// Keys whose values differ from `previous`.
    ///
    /// Only compares values; a change of source with an equal value is not
    /// reported.
    pub fn diff(&self, previous: &ResolvedSettings) -> Vec<SettingChange> {
        let old: Vec<_> = previous.flatten();
        let new: Vec<_> = self.flatten();
        let mut changes = Vec::new();

        for (path, resolved) in &new {
            let before = old.iter().find(|(p, _)| p == path).map(|(_, v)| *v);
            if before.map(|b| &b.value) != Some(&resolved.value) {
                changes.push(SettingChange {
                    path: path.clone(),
                    key: resolved.provenance.key.clone(),
                    old: before.map(|b| b.value.clone()),
                    new: Some(resolved.value.clone()),
                });
            }
        }
        for (path, resolved) in &old {
            if !new.iter().any(|(p, _)| p == path) {
                changes.push(SettingChange {
                    path: path.clone(),
                    key: resolved.provenance.key.clone(),
                    old: Some(resolved.value.clone()),
                    new: None,
                });
            }
        }
        changes
    }
}

impl Serialize for ResolvedSettings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
