//! settings-tree
//!
//! Resolves the runner settings tree from explicit overrides, the process
//! environment, a dotenv file and a secrets directory.

use anyhow::Result;
use clap::Parser;
use settings_tree::cli::check::run_check;
use settings_tree::cli::keys::run_keys;
use settings_tree::cli::resolve::run_resolve;
use settings_tree::cli::watch::run_watch;
use settings_tree::cli::{Cli, Command, load_config};
use settings_tree::logging::{LogTarget, init_logging};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let config = load_config(&cli)?;
    debug!(
        prefix = %config.prefix,
        precedence = ?config.precedence,
        "Loaded settings-tree configuration"
    );

    match &cli.command {
        Command::Resolve(args) => run_resolve(&config, args)?,
        Command::Keys(args) => run_keys(&config, args)?,
        Command::Check(args) => {
            if !run_check(&config, args)? {
                std::process::exit(1);
            }
        }
        Command::Watch(args) => run_watch(&config, args).await?,
    }

    Ok(())
}
