//! Structured error types for tree building and settings resolution.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic handling of field-level failures.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingRequired,
    Coercion,
    Constraint,
    SourceUnavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::MissingRequired => write!(f, "MISSING_REQUIRED"),
            ErrorCode::Coercion => write!(f, "COERCION"),
            ErrorCode::Constraint => write!(f, "CONSTRAINT"),
            ErrorCode::SourceUnavailable => write!(f, "SOURCE_UNAVAILABLE"),
        }
    }
}

/// A single failure recorded while walking a settings tree.
///
/// Resolution never stops at the first of these; they are collected into a
/// [`ResolveError`].
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldError {
    #[error("{key} is required but no source provided a value")]
    MissingRequired { key: String },

    #[error("{key}: cannot convert {raw:?} from {source_name} to {expected}")]
    Coercion {
        key: String,
        raw: String,
        expected: String,
        source_name: String,
    },

    #[error("{key}: value {value} violates constraint {constraint}")]
    Constraint {
        key: String,
        value: String,
        constraint: String,
    },

    #[error("source {source_name} is unavailable: {reason}")]
    SourceUnavailable {
        source_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        reason: String,
    },
}

impl FieldError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FieldError::MissingRequired { .. } => ErrorCode::MissingRequired,
            FieldError::Coercion { .. } => ErrorCode::Coercion,
            FieldError::Constraint { .. } => ErrorCode::Constraint,
            FieldError::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
        }
    }

    /// Canonical key of the offending field, if the error is field-scoped.
    pub fn key(&self) -> Option<&str> {
        match self {
            FieldError::MissingRequired { key }
            | FieldError::Coercion { key, .. }
            | FieldError::Constraint { key, .. } => Some(key),
            FieldError::SourceUnavailable { .. } => None,
        }
    }

    // Convenience constructors

    pub fn missing(key: &str) -> Self {
        FieldError::MissingRequired {
            key: key.to_string(),
        }
    }

    pub fn coercion(key: &str, raw: &str, expected: impl fmt::Display, source: &str) -> Self {
        FieldError::Coercion {
            key: key.to_string(),
            raw: raw.to_string(),
            expected: expected.to_string(),
            source_name: source.to_string(),
        }
    }

    pub fn constraint(key: &str, value: impl fmt::Display, constraint: impl fmt::Display) -> Self {
        FieldError::Constraint {
            key: key.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

impl From<SourceError> for FieldError {
    fn from(err: SourceError) -> Self {
        FieldError::SourceUnavailable {
            source_name: err.source_name,
            path: err.path,
            reason: err.reason,
        }
    }
}

/// Aggregate failure of one resolution walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveError {
    errors: Vec<FieldError>,
}

impl ResolveError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Keys of every field-scoped error, in walk order.
    pub fn keys(&self) -> Vec<&str> {
        self.errors.iter().filter_map(FieldError::key).collect()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code() == code)
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "settings resolution failed with {} error(s)",
            self.errors.len()
        )?;
        for err in &self.errors {
            write!(f, "\n  - [{}] {}", err.code(), err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}

/// A source could not be read. Distinct from "key absent".
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{source_name}: {reason}")]
pub struct SourceError {
    pub source_name: String,
    pub path: Option<PathBuf>,
    pub reason: String,
}

impl SourceError {
    pub fn io(source_name: &str, path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        Self {
            reason: format!("cannot read {}: {}", path.display(), err),
            source_name: source_name.to_string(),
            path: Some(path),
        }
    }
}

/// Precondition violations on a settings template, raised by
/// [`SettingsNodeBuilder::build`](crate::settings::SettingsNodeBuilder::build).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeShapeError {
    #[error("duplicate name '{name}' in settings node '{node}'")]
    DuplicateName { node: String, name: String },

    #[error("invalid segment name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("paths '{first}' and '{second}' both flatten to '{key}'")]
    KeyCollision {
        key: String,
        first: String,
        second: String,
    },

    #[error("field '{field}' is required but declares a default")]
    RequiredWithDefault { field: String },

    #[error("field '{field}' is neither required nor has a default")]
    MissingDefault { field: String },

    #[error("field '{field}': invalid constraint {constraint}: {reason}")]
    InvalidConstraint {
        field: String,
        constraint: String,
        reason: String,
    },

    #[error("field '{field}': default {value} violates constraint {constraint}")]
    DefaultViolatesConstraint {
        field: String,
        value: String,
        constraint: String,
    },

    #[error("field '{field}': default {value} is not a valid {expected}")]
    DefaultTypeMismatch {
        field: String,
        value: String,
        expected: String,
    },
}

/// Failure converting a resolved snapshot into a typed settings struct.
#[derive(Debug, Error)]
#[error("cannot extract typed settings from '{node}': {source}")]
pub struct ExtractError {
    pub node: String,
    #[source]
    pub source: serde_json::Error,
}
