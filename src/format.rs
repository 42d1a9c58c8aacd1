//! Output formatting for the CLI: resolved snapshots, key listings, errors.

use crate::error::ResolveError;
use crate::paths::PathNamer;
use crate::settings::{DefaultValue, ResolvedSettings, SettingChange, SettingsNode, Value};
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    /// `KEY=value` lines, loadable as a dotenv file.
    Env,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, RenderError> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Json | OutputFormat::Env => Ok(serde_json::to_string_pretty(value)?),
    }
}

/// Render a snapshot. In `env` form every leaf becomes a `# source` comment
/// line followed by `KEY=value`; null optionals are listed as comments.
pub fn render_resolved(
    resolved: &ResolvedSettings,
    format: OutputFormat,
) -> Result<String, RenderError> {
    if format != OutputFormat::Env {
        return render(resolved, format);
    }
    let mut out = String::new();
    for (_, leaf) in resolved.flatten() {
        let key = &leaf.provenance.key;
        if leaf.value.is_null() {
            out.push_str(&format!("# {} is unset\n", key));
        } else {
            out.push_str(&format!("# {}\n", leaf.provenance.source));
            out.push_str(&format!("{}={}\n", key, leaf.value.to_env_string()));
        }
    }
    Ok(out)
}

/// One row of `keys` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfo {
    pub key: String,
    pub path: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Every leaf of `tree` with its canonical key under `namer`.
pub fn describe_keys(tree: &SettingsNode, namer: &PathNamer) -> Vec<KeyInfo> {
    tree.leaves()
        .into_iter()
        .map(|(path, spec)| KeyInfo {
            key: namer.name(&path),
            path: path.to_string(),
            ty: spec.field_type().to_string(),
            required: spec.is_required(),
            default: match spec.default() {
                Some(DefaultValue::Value(v)) => Some(v.clone()),
                Some(DefaultValue::Factory(_)) => None,
                None => spec.default_for_resolution(),
            },
            constraints: spec.constraints().iter().map(ToString::to_string).collect(),
            description: spec.description().map(str::to_string),
        })
        .collect()
}

/// Render a key listing. In `env` form each key is a commented template line.
pub fn render_keys(keys: &[KeyInfo], format: OutputFormat) -> Result<String, RenderError> {
    if format != OutputFormat::Env {
        return render(&keys, format);
    }
    let mut out = String::new();
    for info in keys {
        if let Some(description) = &info.description {
            out.push_str(&format!("# {}\n", description));
        }
        let mut detail = info.ty.clone();
        if info.required {
            detail.push_str(", required");
        }
        for constraint in &info.constraints {
            detail.push_str(&format!(", {}", constraint));
        }
        out.push_str(&format!("# {}\n", detail));
        let default = info
            .default
            .as_ref()
            .map(Value::to_env_string)
            .unwrap_or_default();
        out.push_str(&format!("#{}={}\n\n", info.key, default));
    }
    Ok(out)
}

pub fn render_errors(err: &ResolveError, format: OutputFormat) -> Result<String, RenderError> {
    match format {
        OutputFormat::Env => Ok(err.to_string()),
        _ => render(&err.errors(), format),
    }
}

pub fn render_changes(changes: &[SettingChange], format: OutputFormat) -> Result<String, RenderError> {
    if format != OutputFormat::Env {
        return render(&changes, format);
    }
    let mut out = String::new();
    for change in changes {
        match &change.new {
            Some(value) if !value.is_null() => {
                out.push_str(&format!("{}={}\n", change.key, value.to_env_string()))
            }
            _ => out.push_str(&format!("# {} is unset\n", change.key)),
        }
    }
    Ok(out)
}
