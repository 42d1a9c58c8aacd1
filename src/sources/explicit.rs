use super::{MapLookup, SourceKind, SourceLookup, SourceProvider};
use crate::error::SourceError;
use crate::paths::{PathNamer, SettingsPath};
use crate::settings::{RawValue, Value};
use std::collections::HashMap;

/// How an override names its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverrideKey {
    /// Segment path, flattened with the resolver's namer when opened.
    Path(SettingsPath),
    /// Already-canonical key such as `PREFECT_RUNNER_SERVER_PORT`.
    Key(String),
}

/// Values supplied programmatically by the caller.
#[derive(Debug, Clone, Default)]
pub struct ExplicitOverrideSource {
    entries: Vec<(OverrideKey, RawValue)>,
}

impl ExplicitOverrideSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the field at a segment path.
    pub fn with_path<I, S>(mut self, segments: I, value: impl Into<RawValue>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            OverrideKey::Path(SettingsPath::from_segments(segments)),
            value.into(),
        );
        self
    }

    /// Override the field at a canonical key.
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.set(OverrideKey::Key(key.into()), value.into());
        self
    }

    /// Later values for the same target replace earlier ones.
    pub fn set(&mut self, key: OverrideKey, value: RawValue) {
        self.entries.retain(|(k, _)| k != &key);
        self.entries.push((key, value));
    }

    /// Build from a nested document: objects become path segments, scalars
    /// become typed values. Arrays are not settings values and are skipped.
    ///
    /// ```
    /// use serde_json::json;
    /// use settings_tree::sources::ExplicitOverrideSource;
    ///
    /// let overrides = ExplicitOverrideSource::from_document(&json!({
    ///     "runner": { "server": { "port": 9090 } }
    /// }));
    /// assert_eq!(overrides.len(), 1);
    /// ```
    pub fn from_document(document: &serde_json::Value) -> Self {
        let mut source = Self::new();
        source.flatten_document(&SettingsPath::root(), document);
        source
    }

    fn flatten_document(&mut self, path: &SettingsPath, document: &serde_json::Value) {
        match document {
            serde_json::Value::Object(map) => {
                for (name, value) in map {
                    self.flatten_document(&path.child(name), value);
                }
            }
            scalar => {
                if path.is_root() {
                    return;
                }
                if let Some(value) = Value::from_json(scalar) {
                    self.set(OverrideKey::Path(path.clone()), RawValue::Typed(value));
                }
            }
        }
    }

    /// Parse `path.to.field=value` assignments as textual overrides.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut source = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (target, value) = assignment
                .split_once('=')
                .ok_or_else(|| format!("expected path=value, got '{}'", assignment))?;
            let target = target.trim();
            if target.is_empty() {
                return Err(format!("empty path in '{}'", assignment));
            }
            let key = if target.contains('.') || target.chars().any(|c| c.is_ascii_lowercase()) {
                OverrideKey::Path(SettingsPath::parse_dotted(target))
            } else {
                OverrideKey::Key(target.to_string())
            };
            source.set(key, RawValue::Text(value.to_string()));
        }
        Ok(source)
    }

    /// Combine with `other`; entries of `other` win.
    pub fn merged(mut self, other: ExplicitOverrideSource) -> Self {
        for (key, value) in other.entries {
            self.set(key, value);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceProvider for ExplicitOverrideSource {
    fn name(&self) -> String {
        "explicit".to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Explicit
    }

    fn open(&self, namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError> {
        let entries: HashMap<String, RawValue> = self
            .entries
            .iter()
            .map(|(key, value)| {
                let key = match key {
                    OverrideKey::Path(path) => namer.name(path),
                    OverrideKey::Key(key) => key.clone(),
                };
                (key, value.clone())
            })
            .collect();
        Ok(Box::new(MapLookup::new(entries)))
    }
}
