//! Typed values, raw source values, and coercion between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete, typed settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to the equivalent JSON scalar.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Convert a JSON scalar; arrays and objects have no settings value.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Render the way an environment variable would carry this value.
    pub fn to_env_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An untyped value as handed over by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Text from the environment, a file, a secret or a textual override.
    Text(String),
    /// An explicit override that is already typed.
    Typed(Value),
}

impl RawValue {
    /// The value as it would be shown in an error message.
    pub fn display_raw(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Typed(v) => v.to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        RawValue::Typed(v)
    }
}

/// Declared semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Integer,
    Float,
    String,
    /// Enumerated string; input matches case-insensitively and is stored in
    /// the declared spelling.
    Enum(Vec<String>),
    /// The inner type, or `null`.
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    /// The type with any `Optional` wrapper removed.
    pub fn base(&self) -> &FieldType {
        match self {
            FieldType::Optional(inner) => inner.base(),
            other => other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base(), FieldType::Integer | FieldType::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self.base(), FieldType::String | FieldType::Enum(_))
    }

    /// Coerce a raw source value to this type.
    ///
    /// Returns `None` when the value cannot represent this type; the caller
    /// turns that into a coercion error carrying the key and source.
    pub fn coerce(&self, raw: &RawValue) -> Option<Value> {
        match raw {
            RawValue::Text(text) => self.coerce_text(text),
            RawValue::Typed(value) => self.accept_typed(value),
        }
    }

    /// Whether an already-typed value is a member of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        self.accept_typed(value).is_some_and(|v| &v == value)
    }

    fn coerce_text(&self, text: &str) -> Option<Value> {
        match self {
            FieldType::Bool => parse_bool(text).map(Value::Bool),
            FieldType::Integer => text.trim().parse::<i64>().ok().map(Value::Integer),
            FieldType::Float => text.trim().parse::<f64>().ok().map(Value::Float),
            FieldType::String => Some(Value::String(text.to_string())),
            FieldType::Enum(variants) => match_variant(variants, text).map(Value::String),
            FieldType::Optional(inner) => inner.coerce_text(text),
        }
    }

    fn accept_typed(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Optional(_), Value::Null) => Some(Value::Null),
            (FieldType::Optional(inner), other) => inner.accept_typed(other),
            (_, Value::String(s)) => self.coerce_text(s),
            (FieldType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            (FieldType::Integer, Value::Integer(i)) => Some(Value::Integer(*i)),
            (FieldType::Float, Value::Float(f)) => Some(Value::Float(*f)),
            (FieldType::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => write!(f, "bool"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::String => write!(f, "string"),
            FieldType::Enum(variants) => write!(f, "one of [{}]", variants.join(", ")),
            FieldType::Optional(inner) => write!(f, "optional {}", inner),
        }
    }
}

/// Case-insensitive boolean vocabulary: `true/false/1/0/yes/no`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn match_variant(variants: &[String], text: &str) -> Option<String> {
    let text = text.trim();
    variants
        .iter()
        .find(|v| v.eq_ignore_ascii_case(text))
        .cloned()
}
