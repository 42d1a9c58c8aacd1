//! Check subcommand.

use crate::config::ResolverConfig;
use crate::format::{OutputFormat, render_errors};
use crate::runner::{Settings, settings_template};
use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Env)]
    pub format: OutputFormat,
}

/// Returns false when resolution failed; every error has been printed.
pub fn run_check(config: &ResolverConfig, args: &CheckArgs) -> Result<bool> {
    let tree = settings_template()?;
    let resolver = config.build_resolver();
    info!(sources = ?resolver.source_names(), "Checking runner settings");

    match resolver.resolve(&tree) {
        Ok(resolved) => {
            // The typed view must also accept the snapshot.
            if let Err(err) = Settings::from_resolved(&resolved) {
                warn!(error = %err, "Resolved settings rejected by typed view");
                println!("error: {}", err);
                return Ok(false);
            }
            println!("ok: {} settings resolved", resolved.flatten().len());
            Ok(true)
        }
        Err(err) => {
            println!("{}", render_errors(&err, args.format)?);
            Ok(false)
        }
    }
}
