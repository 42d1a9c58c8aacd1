//! Structural paths and canonical key naming.
//!
//! A [`SettingsPath`] is the ordered list of segment names from the tree
//! root to a field or node. The [`PathNamer`] flattens it into the canonical
//! environment-variable style key:
//!
//! ```
//! use settings_tree::paths::{PathNamer, SettingsPath};
//!
//! let namer = PathNamer::new("PREFECT");
//! let path = SettingsPath::from_segments(["runner", "server", "port"]);
//! assert_eq!(namer.name(&path), "PREFECT_RUNNER_SERVER_PORT");
//! ```
//!
//! Naming is pure string manipulation; no environment or filesystem access.

use crate::error::TreeShapeError;
use heck::ToShoutySnakeCase;
use std::fmt;

/// Default delimiter between the prefix and each segment.
pub const DEFAULT_DELIMITER: &str = "_";

/// Ordered segments from the tree root to a field or node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingsPath(Vec<String>);

impl SettingsPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `runner.server.port`.
    pub fn parse_dotted(dotted: &str) -> Self {
        Self::from_segments(dotted.split('.').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// A new path with `segment` appended. Empty segments (the root node)
    /// leave the path unchanged.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SettingsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Converts structural paths into canonical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamer {
    prefix: String,
    delimiter: String,
}

impl PathNamer {
    /// Namer with the given root prefix and the default `_` delimiter.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_delimiter(prefix, DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_uppercase(),
            delimiter: delimiter.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Canonical key for `path`: prefix, then each upper-cased segment,
    /// joined by the delimiter.
    pub fn name(&self, path: &SettingsPath) -> String {
        self.join(path.segments())
    }

    /// Canonical key for a path relative to no prefix. Used for collision
    /// detection within a template before a prefix is known.
    pub fn relative_key(segments: &[String]) -> String {
        segments
            .iter()
            .map(|s| s.to_shouty_snake_case())
            .collect::<Vec<_>>()
            .join(DEFAULT_DELIMITER)
    }

    fn join(&self, segments: &[String]) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(segments.len() + 1);
        if !self.prefix.is_empty() {
            parts.push(self.prefix.clone());
        }
        parts.extend(segments.iter().map(|s| s.to_shouty_snake_case()));
        parts.join(&self.delimiter)
    }
}

impl Default for PathNamer {
    fn default() -> Self {
        Self::new("")
    }
}

/// Validate a single segment name.
///
/// Segments start with an ASCII lowercase letter and contain only ASCII
/// lowercase letters, digits and single underscores. Anything else could not
/// be mapped back from an upper-cased key.
pub fn validate_segment(name: &str) -> Result<(), TreeShapeError> {
    let invalid = |reason: &str| TreeShapeError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("segment names cannot be empty"));
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase ASCII letter"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid(
            "only lowercase ASCII letters, digits and '_' are allowed",
        ));
    }
    if name.ends_with('_') {
        return Err(invalid("cannot end with '_'"));
    }
    if name.contains("__") {
        return Err(invalid("cannot contain repeated '_'"));
    }
    Ok(())
}
