//! Ranked providers of raw settings values.
//!
//! Every provider is opened once per resolution run. Opening reads whatever
//! backs the source (process environment, a dotenv file, a secrets
//! directory) into memory; lookups during the walk then hit that snapshot.
//! Nothing is cached across runs, so edits between two resolutions are
//! always observed.
//!
//! | Kind | Default rank | Backing store |
//! |------|--------------|---------------|
//! | [`ExplicitOverrideSource`] | 1 | caller-supplied map |
//! | [`EnvironmentSource`] | 2 | process environment |
//! | [`DotEnvFileSource`] | 3 | `KEY=value` file |
//! | [`SecretsDirectorySource`] | 4 | one file per key |
//! | [`DefaultsSource`] | last | field defaults |

mod defaults;
mod dotenv;
mod environment;
mod explicit;
mod secrets;

pub use defaults::DefaultsSource;
pub use dotenv::{DotEnvFileSource, parse_dotenv};
pub use environment::EnvironmentSource;
pub use explicit::{ExplicitOverrideSource, OverrideKey};
pub use secrets::SecretsDirectorySource;

use crate::error::SourceError;
use crate::paths::PathNamer;
use crate::settings::{FieldSpec, RawValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Kind of a source, used for provenance and precedence configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Explicit,
    Environment,
    #[serde(alias = "dot_env")]
    Dotenv,
    Secrets,
    Defaults,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Explicit => write!(f, "explicit"),
            SourceKind::Environment => write!(f, "environment"),
            SourceKind::Dotenv => write!(f, "dotenv"),
            SourceKind::Secrets => write!(f, "secrets"),
            SourceKind::Defaults => write!(f, "defaults"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explicit" | "override" | "overrides" => Ok(SourceKind::Explicit),
            "env" | "environment" => Ok(SourceKind::Environment),
            "dotenv" | "dot_env" | "env_file" => Ok(SourceKind::Dotenv),
            "secrets" | "secrets_dir" => Ok(SourceKind::Secrets),
            "defaults" | "default" => Ok(SourceKind::Defaults),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

/// A ranked provider of raw values.
pub trait SourceProvider: Send + Sync + fmt::Debug {
    /// Human-readable name for logging and provenance.
    fn name(&self) -> String;

    fn kind(&self) -> SourceKind;

    /// Read the backing store for one resolution run.
    ///
    /// An error means the source exists but could not be read; a source that
    /// is merely absent returns an empty lookup.
    fn open(&self, namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError>;

    /// Filesystem location backing this source, if any.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// Per-run view of one source.
pub trait SourceLookup {
    /// Raw value for `key`, or `None` when the source does not define it.
    fn lookup(&self, key: &str, field: &FieldSpec) -> Option<RawValue>;

    /// Set when the source holds `key` but could not read its value. The
    /// key counts as present, so the search stops with this error.
    fn unreadable(&self, _key: &str) -> Option<SourceError> {
        None
    }

    /// Number of entries held, for logging.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key-value snapshot shared by the map-backed sources.
#[derive(Debug, Clone, Default)]
pub struct MapLookup {
    entries: HashMap<String, RawValue>,
}

impl MapLookup {
    pub fn new(entries: HashMap<String, RawValue>) -> Self {
        Self { entries }
    }

    pub fn from_text<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), RawValue::Text(v.into())))
                .collect(),
        )
    }
}

impl SourceLookup for MapLookup {
    fn lookup(&self, key: &str, _field: &FieldSpec) -> Option<RawValue> {
        self.entries.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
