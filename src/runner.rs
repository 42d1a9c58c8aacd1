//! Runner settings: the tree shipped with the binary.
//!
//! Keys read `PREFECT_RUNNER_...` and `PREFECT_RUNNER_SERVER_...`.

use crate::error::{ExtractError, TreeShapeError};
use crate::settings::{FieldSpec, FieldType, ResolvedSettings, SettingsNode};
use serde::Deserialize;

/// Accepted values for `runner.server.log_level`.
pub const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Template for the `runner.server` group.
pub fn runner_server_template() -> Result<SettingsNode, TreeShapeError> {
    SettingsNode::builder("server")
        .field(
            "enable",
            FieldSpec::bool()
                .default_value(false)
                .describe("Whether or not to enable the runner's webserver."),
        )
        .field(
            "host",
            FieldSpec::string()
                .default_value("localhost")
                .describe("The host address the runner's webserver should bind to."),
        )
        .field(
            "port",
            FieldSpec::integer()
                .default_value(8080)
                .describe("The port the runner's webserver should bind to."),
        )
        .field(
            "log_level",
            FieldSpec::enumeration(LOG_LEVELS)
                .default_value("ERROR")
                .describe("The log level of the runner's webserver."),
        )
        .field(
            "missed_polls_tolerance",
            FieldSpec::integer().default_value(2).describe(
                "Number of missed polls before a runner is considered unhealthy by its webserver.",
            ),
        )
        .build()
}

/// Template for the `runner` group.
pub fn runner_template() -> Result<SettingsNode, TreeShapeError> {
    SettingsNode::builder("runner")
        .field(
            "process_limit",
            FieldSpec::integer()
                .default_value(5)
                .describe("Maximum number of processes a runner will execute in parallel."),
        )
        .field(
            "poll_frequency",
            FieldSpec::integer().default_value(10).describe(
                "Number of seconds a runner should wait between queries for scheduled work.",
            ),
        )
        .field(
            "heartbeat_frequency",
            FieldSpec::optional(FieldType::Integer)
                .minimum(30)
                .describe("Number of seconds a runner should wait between heartbeats for flow runs."),
        )
        .node_from(runner_server_template)
        .build()
}

/// Root tree holding `runner`.
pub fn settings_template() -> Result<SettingsNode, TreeShapeError> {
    SettingsNode::root().node_from(runner_template).build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunnerServerSettings {
    pub enable: bool,
    pub host: String,
    pub port: i64,
    pub log_level: LogLevel,
    pub missed_polls_tolerance: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunnerSettings {
    pub process_limit: i64,
    pub poll_frequency: i64,
    pub heartbeat_frequency: Option<i64>,
    pub server: RunnerServerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub runner: RunnerSettings,
}

impl Settings {
    /// Typed view of a snapshot produced from [`settings_template`].
    pub fn from_resolved(resolved: &ResolvedSettings) -> Result<Self, ExtractError> {
        resolved.extract()
    }
}
