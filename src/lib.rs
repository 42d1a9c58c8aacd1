//! Hierarchical typed settings resolved from ranked sources.
//!
//! Declare a tree of [`settings::SettingsNode`]s, pick the sources, resolve:
//!
//! ```
//! use settings_tree::resolver::Resolver;
//! use settings_tree::runner::settings_template;
//! use settings_tree::sources::EnvironmentSource;
//!
//! let tree = settings_template().unwrap();
//! let resolver = Resolver::builder("PREFECT")
//!     .source(EnvironmentSource::from_vars([("PREFECT_RUNNER_SERVER_PORT", "9090")]))
//!     .build();
//!
//! let resolved = resolver.resolve(&tree).unwrap();
//! assert_eq!(resolved.get_i64("runner.server.port"), Some(9090));
//! assert_eq!(resolved.get_i64("runner.poll_frequency"), Some(10));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod merge;
pub mod paths;
pub mod reload;
pub mod resolver;
pub mod runner;
pub mod settings;
pub mod sources;
pub mod watcher;
