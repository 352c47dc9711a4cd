use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Declares the fields a plugin task reads from its config subtree, so
/// `load_config` can report every missing or mistyped field at once.
pub trait TaskShape: DeserializeOwned {
    const FIELDS: &'static [FieldSpec];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Long,
    Double,
    String,
    Object,
    Array,
    Any,
}

/// Checks a coerced field value against its target type. The error is the
/// deserializer's message.
pub type FieldCheck = fn(&Value) -> Result<(), String>;

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub check: Option<FieldCheck>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: true,
            check: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: false,
            check: None,
        }
    }

    /// Also deserializes the field as `V` during validation, so enum values
    /// and nested shapes are reported with the other violations.
    pub const fn typed<V: DeserializeOwned>(self) -> Self {
        FieldSpec {
            check: Some(check_as::<V>),
            ..self
        }
    }
}

fn check_as<V: DeserializeOwned>(value: &Value) -> Result<(), String> {
    V::deserialize(value).map(|_| ()).map_err(|e| e.to_string())
}

impl FieldKind {
    /// Converts `value` to this kind, applying scalar coercion. Returns
    /// `None` when the value cannot be represented.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldKind::Any, v) => Some(v.clone()),
            (FieldKind::Bool, Value::Bool(_)) => Some(value.clone()),
            (FieldKind::Bool, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (FieldKind::Long, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (FieldKind::Long, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (FieldKind::Double, Value::Number(_)) => Some(value.clone()),
            (FieldKind::Double, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (FieldKind::String, Value::String(_)) => Some(value.clone()),
            (FieldKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (FieldKind::Object, Value::Object(_)) => Some(value.clone()),
            (FieldKind::Array, Value::Array(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "boolean",
            FieldKind::Long => "long",
            FieldKind::Double => "double",
            FieldKind::String => "string",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
            FieldKind::Any => "any",
        };
        f.write_str(name)
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "long",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
