//! Resolution of a settings tree against ranked sources.
//!
//! For every leaf the resolver computes the canonical key, asks each source
//! in precedence order, and keeps the first hit. Hits are coerced to the
//! declared type and checked against the field's constraints; defaults skip
//! both because they were validated when the tree was built. Errors are
//! collected across the whole tree and reported together.

use crate::error::{FieldError, ResolveError};
use crate::paths::{PathNamer, SettingsPath};
use crate::settings::{
    FieldSpec, Provenance, RawValue, ResolvedEntry, ResolvedSettings, ResolvedValue, SettingsEntry,
    SettingsNode,
};
use crate::sources::{
    DefaultsSource, DotEnvFileSource, EnvironmentSource, ExplicitOverrideSource,
    SecretsDirectorySource, SourceKind, SourceLookup, SourceProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resolves settings trees against an ordered list of sources.
///
/// The resolver holds no per-run state, so one instance can serve
/// concurrent `resolve` calls from several threads.
#[derive(Debug, Clone)]
pub struct Resolver {
    namer: PathNamer,
    /// Ordered by precedence, highest first. Defaults are implicit and last.
    sources: Vec<Arc<dyn SourceProvider>>,
}

impl Resolver {
    pub fn builder(prefix: impl Into<String>) -> ResolverBuilder {
        ResolverBuilder::new(PathNamer::new(prefix))
    }

    /// Explicit overrides, environment, `.env` in the working directory,
    /// then defaults.
    pub fn standard(prefix: impl Into<String>) -> Self {
        Self::builder(prefix)
            .environment()
            .dotenv(".env")
            .build()
    }

    /// Only declared defaults.
    pub fn defaults_only(prefix: impl Into<String>) -> Self {
        Self::builder(prefix).build()
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    /// Source names in precedence order, including the trailing defaults.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(DefaultsSource.name()))
            .collect()
    }

    /// Paths of the first dotenv file and secrets directory, for watchers.
    pub fn watched_paths(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        let first = |kind: SourceKind| {
            self.sources
                .iter()
                .filter(|s| s.kind() == kind)
                .find_map(|s| s.watch_path().map(PathBuf::from))
        };
        (first(SourceKind::Dotenv), first(SourceKind::Secrets))
    }

    /// Resolve `tree` against the configured sources.
    pub fn resolve(&self, tree: &SettingsNode) -> Result<ResolvedSettings, ResolveError> {
        self.run(tree, None)
    }

    /// Resolve with call-time overrides that outrank every configured source.
    pub fn resolve_with_overrides(
        &self,
        tree: &SettingsNode,
        overrides: &ExplicitOverrideSource,
    ) -> Result<ResolvedSettings, ResolveError> {
        self.run(tree, Some(overrides))
    }

    fn run(
        &self,
        tree: &SettingsNode,
        overrides: Option<&ExplicitOverrideSource>,
    ) -> Result<ResolvedSettings, ResolveError> {
        let start = Instant::now();
        let mut errors = Vec::new();

        let providers = overrides
            .map(|o| o as &dyn SourceProvider)
            .into_iter()
            .chain(self.sources.iter().map(|s| s.as_ref() as &dyn SourceProvider))
            .chain(std::iter::once(&DefaultsSource as &dyn SourceProvider));

        let mut opened = Vec::new();
        for provider in providers {
            match provider.open(&self.namer) {
                Ok(lookup) => opened.push(OpenedSource {
                    name: provider.name(),
                    kind: provider.kind(),
                    lookup,
                }),
                Err(e) => {
                    warn!(source = %provider.name(), error = %e, "Settings source unavailable");
                    errors.push(FieldError::from(e));
                }
            }
        }

        let mut walk = Walk {
            namer: &self.namer,
            sources: &opened,
            errors,
            fields: 0,
        };
        let resolved = walk.node(tree, &SettingsPath::root().child(tree.name()));

        info!(
            tree = %display_tree_name(tree),
            fields = walk.fields,
            errors = walk.errors.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Resolved settings tree"
        );

        if walk.errors.is_empty() {
            Ok(resolved)
        } else {
            Err(ResolveError::new(walk.errors))
        }
    }
}

fn display_tree_name(tree: &SettingsNode) -> &str {
    if tree.is_root() { "<root>" } else { tree.name() }
}

struct OpenedSource {
    name: String,
    kind: SourceKind,
    lookup: Box<dyn SourceLookup>,
}

/// State of one resolution walk.
struct Walk<'a> {
    namer: &'a PathNamer,
    sources: &'a [OpenedSource],
    errors: Vec<FieldError>,
    fields: usize,
}

impl Walk<'_> {
    fn node(&mut self, node: &SettingsNode, path: &SettingsPath) -> ResolvedSettings {
        let mut entries = Vec::new();
        for (name, entry) in node.children() {
            let child_path = path.child(name);
            match entry {
                SettingsEntry::Field(spec) => {
                    if let Some(value) = self.field(spec, &child_path) {
                        entries.push((name.to_string(), ResolvedEntry::Value(value)));
                    }
                }
                SettingsEntry::Node(child) => {
                    let resolved = self.node(child, &child_path);
                    entries.push((name.to_string(), ResolvedEntry::Node(resolved)));
                }
            }
        }
        ResolvedSettings::new(node.name().to_string(), entries)
    }

    fn field(&mut self, spec: &FieldSpec, path: &SettingsPath) -> Option<ResolvedValue> {
        let key = self.namer.name(path);

        for source in self.sources {
            if let Some(err) = source.lookup.unreadable(&key) {
                warn!(key = %key, source = %source.name, error = %err, "Setting unreadable");
                self.errors.push(FieldError::from(err));
                return None;
            }
            let Some(raw) = source.lookup.lookup(&key, spec) else {
                continue;
            };
            let provenance = Provenance {
                key: key.clone(),
                kind: source.kind,
                source: source.name.clone(),
            };

            if source.kind == SourceKind::Defaults
                && let RawValue::Typed(value) = raw
            {
                self.fields += 1;
                return Some(ResolvedValue { value, provenance });
            }

            // Presence stops the search even when the value is invalid.
            let Some(value) = spec.field_type().coerce(&raw) else {
                self.errors.push(FieldError::coercion(
                    &key,
                    &raw.display_raw(),
                    spec.field_type(),
                    &source.name,
                ));
                return None;
            };
            if let Some(constraint) = spec.violated_constraint(&value) {
                self.errors
                    .push(FieldError::constraint(&key, &value, constraint));
                return None;
            }

            debug!(key = %key, source = %source.name, "Resolved setting");
            self.fields += 1;
            return Some(ResolvedValue { value, provenance });
        }

        if spec.is_required() {
            self.errors.push(FieldError::missing(&key));
        }
        None
    }
}

/// Builder for [`Resolver`]; sources are ranked in the order they are added.
#[derive(Debug)]
pub struct ResolverBuilder {
    namer: PathNamer,
    sources: Vec<Arc<dyn SourceProvider>>,
}

impl ResolverBuilder {
    fn new(namer: PathNamer) -> Self {
        Self {
            namer,
            sources: Vec::new(),
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.namer = PathNamer::with_delimiter(self.namer.prefix(), delimiter);
        self
    }

    /// Add a source below every source added so far.
    pub fn source(mut self, source: impl SourceProvider + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn explicit(self, overrides: ExplicitOverrideSource) -> Self {
        self.source(overrides)
    }

    pub fn environment(self) -> Self {
        self.source(EnvironmentSource::new())
    }

    pub fn dotenv(self, path: impl Into<PathBuf>) -> Self {
        self.source(DotEnvFileSource::new(path))
    }

    pub fn secrets_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.source(SecretsDirectorySource::new(dir))
    }

    /// Finish the chain. Defaults always rank last, so any explicitly added
    /// defaults source is dropped in favour of the implicit one.
    pub fn build(self) -> Resolver {
        let sources = self
            .sources
            .into_iter()
            .filter(|s| s.kind() != SourceKind::Defaults)
            .collect();
        Resolver {
            namer: self.namer,
            sources,
        }
    }
}
