//! CLI command definitions for settings-tree.
//!
//! Global options shape the resolver; subcommands decide what to do with the
//! runner settings tree.

pub mod check;
pub mod keys;
pub mod resolve;
pub mod watch;

use crate::config::{ConfigTier, ResolverConfig};
use crate::sources::SourceKind;
use anyhow::Result;
use check::CheckArgs;
use clap::{Parser, Subcommand};
use keys::KeysArgs;
use resolve::ResolveArgs;
use std::path::PathBuf;
use tracing::debug;
use watch::WatchArgs;

/// Resolve hierarchical settings from overrides, environment, dotenv files
/// and secrets directories.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (replaces user/project discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Key prefix, e.g. PREFECT
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Dotenv file to read
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Secrets directory to read
    #[arg(long, global = true)]
    pub secrets_dir: Option<PathBuf>,

    /// Source order, highest first (comma-separated: explicit,environment,dotenv,secrets)
    #[arg(long, global = true, value_delimiter = ',')]
    pub precedence: Option<Vec<SourceKind>>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the runner settings and print them
    Resolve(ResolveArgs),

    /// List canonical keys with type, default and constraints
    Keys(KeysArgs),

    /// Resolve and report every error; exits non-zero on failure
    Check(CheckArgs),

    /// Resolve, then re-resolve whenever the dotenv file or secrets change
    Watch(WatchArgs),
}

/// Load the engine configuration and apply command-line overrides on top.
pub fn load_config(cli: &Cli) -> Result<ResolverConfig> {
    let loaded = match &cli.config {
        Some(path) => ResolverConfig::load_file(path)?,
        None => ResolverConfig::load()?,
    };
    for (tier, path) in &loaded.tiers {
        debug!(tier = %tier, path = ?path, "Applied config tier");
    }
    for (field, tier) in &loaded.origins {
        if *tier != ConfigTier::Defaults {
            debug!(field = %field, tier = %tier, "Config field overridden");
        }
    }

    let mut config = loaded.config;
    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(env_file) = &cli.env_file {
        config.env_file = Some(env_file.clone());
    }
    if let Some(secrets_dir) = &cli.secrets_dir {
        config.secrets_dir = Some(secrets_dir.clone());
    }
    if let Some(precedence) = &cli.precedence {
        config.precedence = precedence.clone();
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::try_parse_from([
            "settings-tree",
            "--prefix",
            "APP",
            "--precedence",
            "environment,secrets",
            "resolve",
            "--set",
            "runner.server.port=9090",
            "--format",
            "env",
        ])
        .unwrap();

        assert_eq!(cli.prefix.as_deref(), Some("APP"));
        assert_eq!(
            cli.precedence,
            Some(vec![SourceKind::Environment, SourceKind::Secrets])
        );
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.set, vec!["runner.server.port=9090"]);
        assert_eq!(args.format, OutputFormat::Env);
    }

    #[test]
    fn test_unknown_source_rejected() {
        let result = Cli::try_parse_from(["settings-tree", "--precedence", "vault", "check"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("settings-tree.yaml");
        std::fs::write(&file, "prefix: FILE\nsecrets_dir: /from/file\n").unwrap();

        let cli = Cli::try_parse_from([
            "settings-tree",
            "--config",
            file.to_str().unwrap(),
            "--secrets-dir",
            "/from/cli",
            "keys",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.prefix, "FILE");
        assert_eq!(config.secrets_dir, Some(PathBuf::from("/from/cli")));
    }
}
