//! Interpreter-native object model.
//!
//! Objects are what interpreter code sees. They are richer than boundary
//! values: tuples, dicts keyed by arbitrary objects, and builtin functions
//! exist here but have no direct boundary shape.

use super::module::BuiltinFunction;

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Object>),
    Tuple(Vec<Object>),
    /// Insertion-ordered key/value pairs.
    Dict(Vec<(Object, Object)>),
    Function(BuiltinFunction),
}

impl Object {
    /// Interpreter-facing type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Function(_) => "builtin_function_or_method",
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Looks up a string key in a dict object.
    pub fn dict_get(&self, key: &str) -> Option<&Object> {
        let Self::Dict(entries) = self else {
            return None;
        };
        entries.iter().find_map(|(k, v)| match k {
            Self::Str(text) if text == key => Some(v),
            _ => None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Truthiness as interpreter code would evaluate it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(flag) => *flag,
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Str(text) => !text.is_empty(),
            Self::Bytes(bytes) => !bytes.is_empty(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Dict(entries) => !entries.is_empty(),
            Self::Function(_) => true,
        }
    }
}
