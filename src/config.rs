//! Engine configuration with tier-based merging.
//!
//! Decides the key prefix and which sources the resolver consults, in which
//! order. Loaded from embedded defaults, then the user file, then the
//! project file, merged field by field, with `SETTINGS_TREE_*` environment
//! variables applied last.

use crate::merge::{DocumentError, LayeredDocument, read_document};
use crate::paths::DEFAULT_DELIMITER;
use crate::resolver::Resolver;
use crate::sources::{
    DotEnvFileSource, ExplicitOverrideSource, SecretsDirectorySource, SourceKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "SETTINGS_TREE_PREFIX";
pub const ENV_ENV_FILE: &str = "SETTINGS_TREE_ENV_FILE";
pub const ENV_SECRETS_DIR: &str = "SETTINGS_TREE_SECRETS_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    User = 1,
    Project = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Config file locations for each tier.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_file: Option<PathBuf>,
    pub project_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// `<config dir>/settings-tree/config.yaml` and `./settings-tree.yaml`.
    pub fn discover() -> Self {
        Self {
            user_file: dirs::config_dir().map(|d| d.join("settings-tree").join("config.yaml")),
            project_file: Some(PathBuf::from("settings-tree.yaml")),
        }
    }

    /// A single file replacing discovery.
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            user_file: None,
            project_file: Some(path.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub prefix: String,
    pub delimiter: String,
    /// Sources from highest to lowest rank. Defaults are always last and
    /// cannot be listed.
    pub precedence: Vec<SourceKind>,
    pub env_file: Option<PathBuf>,
    pub env_file_required: bool,
    pub secrets_dir: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefix: "PREFECT".to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            precedence: vec![
                SourceKind::Explicit,
                SourceKind::Environment,
                SourceKind::Dotenv,
                SourceKind::Secrets,
            ],
            env_file: Some(PathBuf::from(".env")),
            env_file_required: false,
            secrets_dir: None,
        }
    }
}

/// A loaded configuration plus the files it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ResolverConfig,
    pub tiers: Vec<(ConfigTier, Option<PathBuf>)>,
    /// Tier that set each field, by dotted path (`precedence`, `env_file`).
    pub origins: BTreeMap<String, ConfigTier>,
}

impl LoadedConfig {
    pub fn origin(&self, field: &str) -> Option<ConfigTier> {
        self.origins.get(field).copied()
    }
}

impl ResolverConfig {
    /// Load from the discovered tiers and the process environment.
    pub fn load() -> Result<LoadedConfig, ConfigError> {
        Self::load_with_paths(&ConfigPaths::discover(), |name| std::env::var(name).ok())
    }

    /// Load from explicit paths. `env` looks up `SETTINGS_TREE_*` overrides.
    pub fn load_with_paths<F>(paths: &ConfigPaths, env: F) -> Result<LoadedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document = LayeredDocument::new();
        document.push(ConfigTier::Defaults, serde_json::to_value(Self::default())?);
        let mut tiers = vec![(ConfigTier::Defaults, None)];

        for (tier, file) in [
            (ConfigTier::User, &paths.user_file),
            (ConfigTier::Project, &paths.project_file),
        ] {
            let Some(file) = file else { continue };
            if !file.exists() {
                continue;
            }
            debug!(tier = %tier, path = %file.display(), "Loading settings-tree config");
            document.push(tier, read_document(file)?);
            tiers.push((tier, Some(file.clone())));
        }

        let mut origins = document.origins().clone();
        let mut config: ResolverConfig = serde_json::from_value(document.into_value())?;
        let applied = config.apply_env_overrides(env);
        if !applied.is_empty() {
            tiers.push((ConfigTier::Environment, None));
        }
        for field in applied {
            origins.insert(field.to_string(), ConfigTier::Environment);
        }
        config.validate()?;

        Ok(LoadedConfig {
            config,
            tiers,
            origins,
        })
    }

    /// Load a single file on top of the defaults, skipping discovery.
    pub fn load_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Document(DocumentError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }));
        }
        Self::load_with_paths(&ConfigPaths::explicit(path), |name| std::env::var(name).ok())
    }

    /// Returns the fields that were overridden.
    fn apply_env_overrides<F>(&mut self, env: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        if let Some(prefix) = env(ENV_PREFIX) {
            self.prefix = prefix;
            applied.push("prefix");
        }
        if let Some(env_file) = env(ENV_ENV_FILE) {
            self.env_file = Some(PathBuf::from(env_file));
            applied.push("env_file");
        }
        if let Some(secrets_dir) = env(ENV_SECRETS_DIR) {
            self.secrets_dir = Some(PathBuf::from(secrets_dir));
            applied.push("secrets_dir");
        }
        applied
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::Validation(
                "delimiter cannot be empty".to_string(),
            ));
        }
        for (i, kind) in self.precedence.iter().enumerate() {
            if *kind == SourceKind::Defaults {
                return Err(ConfigError::Validation(
                    "defaults always rank last and cannot be listed".to_string(),
                ));
            }
            if self.precedence[..i].contains(kind) {
                return Err(ConfigError::Validation(format!(
                    "source {} listed twice in precedence",
                    kind
                )));
            }
        }
        Ok(())
    }

    /// Resolver with no call-time overrides.
    pub fn build_resolver(&self) -> Resolver {
        self.build_resolver_with(None)
    }

    /// Resolver with `overrides` placed at the `explicit` rank.
    pub fn build_resolver_with(&self, mut overrides: Option<ExplicitOverrideSource>) -> Resolver {
        let mut builder = Resolver::builder(&self.prefix).delimiter(&self.delimiter);

        for kind in &self.precedence {
            builder = match kind {
                SourceKind::Explicit => match overrides.take() {
                    Some(overrides) => builder.explicit(overrides),
                    None => builder,
                },
                SourceKind::Environment => builder.environment(),
                SourceKind::Dotenv => match &self.env_file {
                    Some(path) => {
                        let source = DotEnvFileSource::new(path);
                        builder.source(if self.env_file_required {
                            source.required()
                        } else {
                            source
                        })
                    }
                    None => builder,
                },
                SourceKind::Secrets => match &self.secrets_dir {
                    Some(dir) => builder.source(SecretsDirectorySource::new(dir)),
                    None => builder,
                },
                SourceKind::Defaults => builder,
            };
        }
        builder.build()
    }
}
