//! Keys subcommand.

use crate::config::ResolverConfig;
use crate::format::{OutputFormat, describe_keys, render_keys};
use crate::runner::settings_template;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct KeysArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub fn run_keys(config: &ResolverConfig, args: &KeysArgs) -> Result<()> {
    let tree = settings_template()?;
    let resolver = config.build_resolver();
    let keys = describe_keys(&tree, resolver.namer());
    println!("{}", render_keys(&keys, args.format)?.trim_end());
    Ok(())
}
