use super::{MapLookup, SourceKind, SourceLookup, SourceProvider};
use crate::error::SourceError;
use crate::paths::PathNamer;
use crate::settings::{FieldSpec, RawValue};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory holding one file per key, as mounted by container runtimes.
///
/// The file name is the canonical key (case-sensitive where the filesystem
/// is) and the trimmed file contents are the value. A file that cannot be
/// read fails only its own key.
#[derive(Debug, Clone)]
pub struct SecretsDirectorySource {
    dir: PathBuf,
}

impl SecretsDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SourceProvider for SecretsDirectorySource {
    fn name(&self) -> String {
        format!("secrets:{}", self.dir.display())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Secrets
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn open(&self, namer: &PathNamer) -> Result<Box<dyn SourceLookup>, SourceError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Secrets directory not found, skipping");
                return Ok(Box::new(MapLookup::default()));
            }
            Err(e) => return Err(SourceError::io(&self.name(), &self.dir, &e)),
        };

        let prefix = namer.prefix();
        let mut secrets = Vec::new();
        let mut unreadable = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::io(&self.name(), &self.dir, &e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !prefix.is_empty() && !name.starts_with(prefix) {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => secrets.push((name, content.trim().to_string())),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read secret file");
                    unreadable.insert(name, SourceError::io(&self.name(), &path, &e));
                }
            }
        }

        debug!(
            dir = %self.dir.display(),
            count = secrets.len(),
            unreadable = unreadable.len(),
            "Read secrets directory"
        );
        Ok(Box::new(SecretsLookup {
            values: MapLookup::from_text(secrets),
            unreadable,
        }))
    }
}

struct SecretsLookup {
    values: MapLookup,
    unreadable: HashMap<String, SourceError>,
}

impl SourceLookup for SecretsLookup {
    fn lookup(&self, key: &str, field: &FieldSpec) -> Option<RawValue> {
        self.values.lookup(key, field)
    }

    fn unreadable(&self, key: &str) -> Option<SourceError> {
        self.unreadable.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}
