//! Watch subcommand.

use crate::config::ResolverConfig;
use crate::format::{OutputFormat, render_changes, render_resolved};
use crate::reload::SettingsHandle;
use crate::runner::settings_template;
use crate::watcher::{SettingsChangeEvent, WatchPaths, WatcherConfig, start_settings_watcher};
use anyhow::{Result, bail};
use clap::Args;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Env)]
    pub format: OutputFormat,

    /// Debounce window in milliseconds
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,
}

pub async fn run_watch(config: &ResolverConfig, args: &WatchArgs) -> Result<()> {
    let handle = SettingsHandle::new(config.build_resolver(), settings_template()?)?;
    println!("{}", render_resolved(&handle.current(), args.format)?.trim_end());

    let (env_file, secrets_dir) = handle.resolver().watched_paths();
    let paths = WatchPaths {
        env_file,
        secrets_dir,
    }
    .absolute(&std::env::current_dir()?);
    if paths.is_empty() {
        bail!("nothing to watch: no dotenv file or secrets directory is configured");
    }

    let mut watcher = start_settings_watcher(
        paths,
        WatcherConfig {
            debounce_duration: Duration::from_millis(args.debounce_ms),
        },
    )?;

    loop {
        tokio::select! {
            event = watcher.wait_for_change() => {
                let Some(event) = event else { break };
                if let SettingsChangeEvent::Error(message) = &event {
                    warn!(error = %message, "Watcher reported an error");
                    continue;
                }
                match handle.reload() {
                    Ok(changes) if changes.is_empty() => {}
                    Ok(changes) => println!("{}", render_changes(&changes, args.format)?.trim_end()),
                    Err(err) => eprintln!("{}", err),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}
