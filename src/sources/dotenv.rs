use super::{MapLookup, SourceKind, SourceLookup, SourceProvider};
use crate::error::SourceError;
use crate::paths::PathNamer;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A `KEY=value` file, parsed on every open.
#[derive(Debug, Clone)]
pub struct DotEnvFileSource {
    path: PathBuf,
    required: bool,
}

impl DotEnvFileSource {
    /// Source backed by `path`. A missing file means every lookup misses.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    /// Treat a missing file as an unavailable source instead of a miss.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceProvider for DotEnvFileSource {
    fn name(&self) -> String {
        format!("dotenv:{}", self.path.display())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Dotenv
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn open(&self, _namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound && !self.required => {
                debug!(path = %self.path.display(), "Dotenv file not found, skipping");
                return Ok(Box::new(MapLookup::default()));
            }
            Err(e) => return Err(SourceError::io(&self.name(), &self.path, &e)),
        };

        let entries = parse_dotenv(&content);
        debug!(path = %self.path.display(), count = entries.len(), "Parsed dotenv file");
        Ok(Box::new(MapLookup::from_text(entries)))
    }
}

/// Parse dotenv content.
///
/// One `KEY=VALUE` pair per line. Blank lines and lines starting with `#`
/// are ignored, a leading `export ` is dropped, key and value are trimmed,
/// and nothing is unquoted or unescaped. Later duplicates win.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            warn!(line = index + 1, "Ignoring dotenv line without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!(line = index + 1, "Ignoring dotenv line with empty key");
            continue;
        }
        entries.insert(key.to_string(), value.trim().to_string());
    }

    entries
}
