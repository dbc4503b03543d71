//! Boundary value model.
//!
//! # Responsibility
//! - Define the tagged union every argument and result takes while crossing
//!   the host/interpreter boundary.
//! - Convert to and from JSON documents for hosts that exchange structured
//!   data as text.
//!
//! # Invariants
//! - Integers are 64-bit signed; JSON numbers outside that range are rejected,
//!   never truncated.
//! - Strings and byte buffers are owned; a `Value` never aliases host memory.

use crate::marshal::{MarshalError, MAX_NESTING_DEPTH};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Tag of one boundary value, used by callback signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Map,
}

impl ValueTag {
    /// Canonical lowercase name used in signatures and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
        }
    }

    /// Parses a tag name, accepting the common aliases hosts use.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "null" | "none" | "void" => Some(Self::Null),
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "integer" | "i64" | "long" => Some(Self::Int),
            "float" | "double" | "f64" => Some(Self::Float),
            "str" | "string" => Some(Self::Str),
            "bytes" | "buffer" => Some(Self::Bytes),
            "list" | "array" => Some(Self::List),
            "map" | "mapping" | "dict" => Some(Self::Map),
            _ => None,
        }
    }
}

impl Display for ValueTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marshaled value crossing the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Null => ValueTag::Null,
            Self::Bool(_) => ValueTag::Bool,
            Self::Int(_) => ValueTag::Int,
            Self::Float(_) => ValueTag::Float,
            Self::Str(_) => ValueTag::Str,
            Self::Bytes(_) => ValueTag::Bytes,
            Self::List(_) => ValueTag::List,
            Self::Map(_) => ValueTag::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Builds a map value from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Converts a parsed JSON document into a boundary value.
    ///
    /// # Errors
    /// - `Unrepresentable` for numbers that fit neither `i64` nor `f64`
    ///   exactly, and for documents nested deeper than the marshaling limit.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, MarshalError> {
        from_json_at(json, 0)
    }

    /// Parses JSON text into a boundary value.
    pub fn from_json_str(text: &str) -> Result<Self, MarshalError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| MarshalError::Unrepresentable(format!("invalid JSON payload: {err}")))?;
        Self::from_json(&json)
    }

    /// Renders this value as a JSON document.
    ///
    /// Byte buffers render as arrays of integers; non-finite floats render
    /// as `null`.
    pub fn to_json(&self) -> Result<serde_json::Value, MarshalError> {
        serde_json::to_value(self).map_err(|err| {
            MarshalError::Unrepresentable(format!("value cannot be rendered as JSON: {err}"))
        })
    }
}

fn from_json_at(json: &serde_json::Value, depth: usize) -> Result<Value, MarshalError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(MarshalError::TooDeep(MAX_NESTING_DEPTH));
    }
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Bool(*flag),
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::Int(int)
            } else if number.is_u64() {
                return Err(MarshalError::Unrepresentable(format!(
                    "integer {number} exceeds the signed 64-bit range"
                )));
            } else {
                match number.as_f64() {
                    Some(float) => Value::Float(float),
                    None => {
                        return Err(MarshalError::Unrepresentable(format!(
                            "number {number} is not representable"
                        )))
                    }
                }
            }
        }
        serde_json::Value::String(text) => Value::Str(text.clone()),
        serde_json::Value::Array(items) => Value::List(
            items
                .iter()
                .map(|item| from_json_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), from_json_at(item, depth + 1)?)))
                .collect::<Result<_, MarshalError>>()?,
        ),
    })
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Int(int) => serializer.serialize_i64(*int),
            Self::Float(float) => serializer.serialize_f64(*float),
            Self::Str(text) => serializer.serialize_str(text),
            Self::Bytes(bytes) => serializer.serialize_bytes(bytes),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, item) in entries {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}
