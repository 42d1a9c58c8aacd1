use super::{MapLookup, SourceKind, SourceLookup, SourceProvider};
use crate::error::SourceError;
use crate::paths::PathNamer;
use std::collections::HashMap;
use tracing::debug;

/// Process environment, snapshotted when opened.
///
/// Only variables carrying the resolver's prefix are captured. Variables
/// whose name or value is not valid UTF-8 are skipped.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSource {
    /// Fixed variables used instead of the process environment.
    fixed: Option<HashMap<String, String>>,
}

impl EnvironmentSource {
    /// Read the real process environment on every open.
    pub fn new() -> Self {
        Self { fixed: None }
    }

    /// Use the given variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fixed: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl SourceProvider for EnvironmentSource {
    fn name(&self) -> String {
        "environment".to_string()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Environment
    }

    fn open(&self, namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError> {
        let prefix = namer.prefix();
        let matches = |key: &str| prefix.is_empty() || key.starts_with(prefix);

        let vars: Vec<(String, String)> = match &self.fixed {
            Some(fixed) => fixed
                .iter()
                .filter(|(k, _)| matches(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .filter(|(k, _)| matches(k))
                .collect(),
        };

        debug!(count = vars.len(), prefix = %prefix, "Captured environment variables");
        Ok(Box::new(MapLookup::from_text(vars)))
    }
}
