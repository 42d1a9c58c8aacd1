//! Leaf field declarations: type, default, constraints.

use super::value::{FieldType, RawValue, Value};
use crate::error::TreeShapeError;
use regex_lite::Regex;
use std::fmt;
use std::sync::Arc;

/// Zero-argument producer of a default value.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Where a field's fallback value comes from.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    /// Invoked once per resolution; never cached across resolutions.
    Factory(DefaultFactory),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A validation rule checked after coercion.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Inclusive lower bound for numeric fields.
    Minimum(f64),
    /// Inclusive upper bound for numeric fields.
    Maximum(f64),
    /// Membership in a fixed set of strings.
    OneOf(Vec<String>),
    /// Full-match regular expression for string fields.
    Pattern(Regex),
    MinLength(usize),
    MaxLength(usize),
}

impl Constraint {
    /// Compile a pattern constraint; the whole value must match.
    pub fn pattern(pattern: &str) -> Result<Self, regex_lite::Error> {
        Regex::new(&format!("^(?:{})$", pattern)).map(Constraint::Pattern)
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Whether `value` satisfies this constraint. `null` always does.
    pub fn check(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Constraint::Minimum(min) => value.as_f64().is_some_and(|v| v >= *min),
            Constraint::Maximum(max) => value.as_f64().is_some_and(|v| v <= *max),
            Constraint::OneOf(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s)),
            Constraint::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Constraint::MinLength(n) => value.as_str().is_some_and(|s| s.chars().count() >= *n),
            Constraint::MaxLength(n) => value.as_str().is_some_and(|s| s.chars().count() <= *n),
        }
    }

    /// Reject constraints that cannot apply to `ty` or are self-contradictory.
    fn validate_for(&self, field: &str, ty: &FieldType) -> Result<(), TreeShapeError> {
        let invalid = |reason: &str| TreeShapeError::InvalidConstraint {
            field: field.to_string(),
            constraint: self.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Constraint::Minimum(bound) | Constraint::Maximum(bound) => {
                if !ty.is_numeric() {
                    return Err(invalid("bounds only apply to numeric fields"));
                }
                if bound.is_nan() {
                    return Err(invalid("bound is NaN"));
                }
            }
            Constraint::OneOf(allowed) => {
                if !ty.is_textual() {
                    return Err(invalid("membership only applies to string fields"));
                }
                if allowed.is_empty() {
                    return Err(invalid("allowed set is empty"));
                }
            }
            Constraint::Pattern(_) | Constraint::MinLength(_) | Constraint::MaxLength(_) => {
                if !ty.is_textual() {
                    return Err(invalid("only applies to string fields"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Minimum(min) => write!(f, "minimum {}", min),
            Constraint::Maximum(max) => write!(f, "maximum {}", max),
            Constraint::OneOf(allowed) => write!(f, "one of [{}]", allowed.join(", ")),
            Constraint::Pattern(re) => write!(f, "pattern {}", re.as_str()),
            Constraint::MinLength(n) => write!(f, "min length {}", n),
            Constraint::MaxLength(n) => write!(f, "max length {}", n),
        }
    }
}

/// Declaration of one leaf setting.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    ty: FieldType,
    default: Option<DefaultValue>,
    constraints: Vec<Constraint>,
    required: bool,
    description: Option<String>,
}

impl FieldSpec {
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            default: None,
            constraints: Vec::new(),
            required: false,
            description: None,
        }
    }

    pub fn bool() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FieldType::enumeration(variants))
    }

    /// An optional field whose implicit default is `null`.
    pub fn optional(inner: FieldType) -> Self {
        Self::new(FieldType::optional(inner))
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn minimum(self, min: impl Into<f64>) -> Self {
        self.constraint(Constraint::Minimum(min.into()))
    }

    pub fn maximum(self, max: impl Into<f64>) -> Self {
        self.constraint(Constraint::Maximum(max.into()))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Produce the fallback value for one resolution, if any.
    ///
    /// Optional fields without an explicit default fall back to `null`.
    pub fn default_for_resolution(&self) -> Option<Value> {
        match &self.default {
            Some(default) => Some(default.produce()),
            None if self.ty.is_optional() && !self.required => Some(Value::Null),
            None => None,
        }
    }

    /// First constraint `value` violates, if any.
    pub fn violated_constraint(&self, value: &Value) -> Option<&Constraint> {
        self.constraints.iter().find(|c| !c.check(value))
    }

    /// Registration-time checks. Static defaults are normalised to the
    /// declared type; factories are invoked once and checked.
    pub(crate) fn validate(&mut self, field: &str) -> Result<(), TreeShapeError> {
        if self.required && self.default.is_some() {
            return Err(TreeShapeError::RequiredWithDefault {
                field: field.to_string(),
            });
        }
        if !self.required && self.default.is_none() && !self.ty.is_optional() {
            return Err(TreeShapeError::MissingDefault {
                field: field.to_string(),
            });
        }

        for constraint in &self.constraints {
            constraint.validate_for(field, &self.ty)?;
        }
        self.validate_bounds(field)?;

        if let Some(default) = &self.default {
            let produced = default.produce();
            let normalised = self.check_default(field, &produced)?;
            if let DefaultValue::Value(_) = default {
                self.default = Some(DefaultValue::Value(normalised));
            }
        }
        Ok(())
    }

    fn check_default(&self, field: &str, value: &Value) -> Result<Value, TreeShapeError> {
        // Defaults are typed declarations, so "8080" is not an integer here.
        let string_for_non_text = matches!(value, Value::String(_)) && !self.ty.is_textual();
        let coerced = if string_for_non_text {
            None
        } else {
            self.ty.coerce(&RawValue::Typed(value.clone()))
        };
        let normalised = coerced.ok_or_else(|| TreeShapeError::DefaultTypeMismatch {
            field: field.to_string(),
            value: value.to_string(),
            expected: self.ty.to_string(),
        })?;

        if let Some(constraint) = self.violated_constraint(&normalised) {
            return Err(TreeShapeError::DefaultViolatesConstraint {
                field: field.to_string(),
                value: normalised.to_string(),
                constraint: constraint.to_string(),
            });
        }
        Ok(normalised)
    }

    fn validate_bounds(&self, field: &str) -> Result<(), TreeShapeError> {
        let min = self.constraints.iter().find_map(|c| match c {
            Constraint::Minimum(m) => Some(*m),
            _ => None,
        });
        let max = self.constraints.iter().find_map(|c| match c {
            Constraint::Maximum(m) => Some(*m),
            _ => None,
        });
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(TreeShapeError::InvalidConstraint {
                field: field.to_string(),
                constraint: format!("minimum {} / maximum {}", min, max),
                reason: "minimum exceeds maximum".to_string(),
            });
        }
        Ok(())
    }
}
