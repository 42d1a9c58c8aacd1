//! Resolve subcommand.

use crate::config::ResolverConfig;
use crate::format::{OutputFormat, render_resolved};
use crate::merge::{LayeredDocument, read_document};
use crate::runner::settings_template;
use crate::sources::{ExplicitOverrideSource, SourceKind};
use anyhow::{Result, anyhow};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Override a setting: dotted path or canonical key, e.g. runner.server.port=9090
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// YAML/JSON override documents, merged in order
    #[arg(long, value_name = "FILE")]
    pub overrides: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

/// Override documents merged in order, then `--set` pairs on top.
pub fn collect_overrides(args: &ResolveArgs) -> Result<ExplicitOverrideSource> {
    let mut documents = LayeredDocument::new();
    for path in &args.overrides {
        documents.push(path.as_path(), read_document(path)?);
    }
    for (setting, file) in documents.origins() {
        debug!(setting = %setting, file = %file.display(), "Override taken from document");
    }
    let from_documents = ExplicitOverrideSource::from_document(documents.value());
    let from_set = ExplicitOverrideSource::from_assignments(&args.set).map_err(|e| anyhow!(e))?;
    Ok(from_documents.merged(from_set))
}

pub fn run_resolve(config: &ResolverConfig, args: &ResolveArgs) -> Result<()> {
    let overrides = collect_overrides(args)?;
    if !overrides.is_empty() && !config.precedence.contains(&SourceKind::Explicit) {
        warn!("Overrides given but 'explicit' is not in the precedence list; they are ignored");
    }

    let tree = settings_template()?;
    let resolved = config
        .build_resolver_with(Some(overrides))
        .resolve(&tree)?;
    print!("{}", render_resolved(&resolved, args.format)?);
    if args.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}
