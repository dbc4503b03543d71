//! Marshaling between interpreter objects and boundary values.
//!
//! # Responsibility
//! - Convert `Object` <-> `Value` at the call boundary.
//! - Check argument lists and results against a callback `Signature`.
//!
//! # Invariants
//! - Conversions copy; no `Value` borrows from an `Object` or vice versa.
//! - Failures are reported as `MarshalError`, never as panics.
//!
//! # See also
//! - `crate::model::value` for the boundary shape.

use crate::interp::object::Object;
use crate::model::signature::Signature;
use crate::model::value::{Value, ValueTag};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deepest list/map nesting accepted in either direction.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Marshaling and signature-check errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    ArgumentCount {
        expected: usize,
        got: usize,
    },
    /// `index` is zero-based; messages render it one-based.
    ArgumentType {
        index: usize,
        expected: ValueTag,
        got: ValueTag,
    },
    Unrepresentable(String),
    ResultType {
        expected: ValueTag,
        got: ValueTag,
    },
    TooDeep(usize),
}

impl MarshalError {
    /// True when the caller passed the wrong arguments, as opposed to a value
    /// that cannot cross the boundary at all.
    pub fn is_argument_mismatch(&self) -> bool {
        matches!(self, Self::ArgumentCount { .. } | Self::ArgumentType { .. })
    }
}

impl Display for MarshalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgumentCount { expected, got } => {
                write!(f, "expected {expected} argument(s), got {got}")
            }
            Self::ArgumentType {
                index,
                expected,
                got,
            } => write!(f, "argument {} must be {expected}, not {got}", index + 1),
            Self::Unrepresentable(message) => f.write_str(message),
            Self::ResultType { expected, got } => {
                write!(f, "callback returned {got}, declared {expected}")
            }
            Self::TooDeep(limit) => write!(f, "value nesting exceeds {limit} levels"),
        }
    }
}

impl Error for MarshalError {}

/// Builds the interpreter object for a boundary value.
pub fn to_native(value: &Value) -> Object {
    match value {
        Value::Null => Object::None,
        Value::Bool(flag) => Object::Bool(*flag),
        Value::Int(int) => Object::Int(*int),
        Value::Float(float) => Object::Float(*float),
        Value::Str(text) => Object::Str(text.clone()),
        Value::Bytes(bytes) => Object::Bytes(bytes.clone()),
        Value::List(items) => Object::List(items.iter().map(to_native).collect()),
        Value::Map(entries) => Object::Dict(
            entries
                .iter()
                .map(|(key, item)| (Object::Str(key.clone()), to_native(item)))
                .collect(),
        ),
    }
}

/// Converts an interpreter object into its boundary value.
///
/// # Errors
/// - `Unrepresentable` for functions and for dicts with non-string keys.
/// - `TooDeep` past `MAX_NESTING_DEPTH`.
pub fn from_native(object: &Object) -> Result<Value, MarshalError> {
    from_native_at(object, 0)
}

fn from_native_at(object: &Object, depth: usize) -> Result<Value, MarshalError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(MarshalError::TooDeep(MAX_NESTING_DEPTH));
    }
    Ok(match object {
        Object::None => Value::Null,
        Object::Bool(flag) => Value::Bool(*flag),
        Object::Int(int) => Value::Int(*int),
        Object::Float(float) => Value::Float(*float),
        Object::Str(text) => Value::Str(text.clone()),
        Object::Bytes(bytes) => Value::Bytes(bytes.clone()),
        Object::List(items) | Object::Tuple(items) => Value::List(
            items
                .iter()
                .map(|item| from_native_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Object::Dict(entries) => {
            let mut map = BTreeMap::new();
            for (key, item) in entries {
                let Object::Str(key) = key else {
                    return Err(MarshalError::Unrepresentable(format!(
                        "dict keys must be str, not {}",
                        key.type_name()
                    )));
                };
                map.insert(key.clone(), from_native_at(item, depth + 1)?);
            }
            Value::Map(map)
        }
        Object::Function(function) => {
            return Err(MarshalError::Unrepresentable(format!(
                "{function:?} cannot cross the native boundary"
            )))
        }
    })
}

/// Converts every positional argument.
pub fn marshal_args(args: &[Object]) -> Result<Vec<Value>, MarshalError> {
    args.iter().map(from_native).collect()
}

/// Checks arity and per-position tags against `signature`.
pub fn validate_args(signature: &Signature, args: &[Value]) -> Result<(), MarshalError> {
    if args.len() != signature.arity() {
        return Err(MarshalError::ArgumentCount {
            expected: signature.arity(),
            got: args.len(),
        });
    }
    for (index, (expected, arg)) in signature.params.iter().zip(args).enumerate() {
        if arg.tag() != *expected {
            return Err(MarshalError::ArgumentType {
                index,
                expected: *expected,
                got: arg.tag(),
            });
        }
    }
    Ok(())
}

/// Checks a callback result against the declared return tag.
///
/// `Null` passes for every declared return: hosts use it for "no data".
pub fn check_result(signature: &Signature, result: &Value) -> Result<(), MarshalError> {
    if result.is_null() || result.tag() == signature.returns {
        return Ok(());
    }
    Err(MarshalError::ResultType {
        expected: signature.returns,
        got: result.tag(),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        check_result, from_native, marshal_args, to_native, validate_args, MarshalError,
        MAX_NESTING_DEPTH,
    };
    use crate::interp::error::ScriptError;
    use crate::interp::lock::CallContext;
    use crate::interp::module::BuiltinFunction;
    use crate::interp::object::Object;
    use crate::model::signature::Signature;
    use crate::model::value::{Value, ValueTag};
    use std::sync::Arc;

    #[test]
    fn tuples_marshal_as_lists() {
        let value = from_native(&Object::Tuple(vec![Object::Int(1), Object::str("a")]))
            .expect("tuple converts");
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::from("a")]));
    }

    #[test]
    fn dict_with_non_string_key_is_unrepresentable() {
        let err = from_native(&Object::Dict(vec![(Object::Int(1), Object::None)]))
            .expect_err("int key must fail");
        assert!(matches!(err, MarshalError::Unrepresentable(_)));
        assert!(!err.is_argument_mismatch());
    }

    #[test]
    fn functions_do_not_cross_the_boundary() {
        let function = BuiltinFunction::new(
            "noop",
            "",
            Arc::new(|_ctx: &mut CallContext<'_, '_>, _args: &[Object]| {
                Ok::<_, ScriptError>(Object::None)
            }),
        );
        let err = marshal_args(&[Object::Int(1), Object::Function(function)])
            .expect_err("function arg must fail");
        assert!(err.to_string().contains("noop"));
    }

    #[test]
    fn rejects_nesting_past_limit() {
        let mut object = Object::Int(0);
        for _ in 0..=MAX_NESTING_DEPTH + 1 {
            object = Object::List(vec![object]);
        }
        assert_eq!(
            from_native(&object),
            Err(MarshalError::TooDeep(MAX_NESTING_DEPTH))
        );
    }

    #[test]
    fn map_values_become_string_keyed_dicts() {
        let object = to_native(&Value::map([("port", Value::Int(1234))]));
        assert_eq!(object.dict_get("port"), Some(&Object::Int(1234)));
    }

    #[test]
    fn validate_reports_count_then_type() {
        let sig = Signature::new(vec![ValueTag::Str, ValueTag::Int], ValueTag::List);

        let count = validate_args(&sig, &[Value::from("x")]).expect_err("short arg list");
        assert_eq!(count.to_string(), "expected 2 argument(s), got 1");

        let kind = validate_args(&sig, &[Value::Int(7), Value::Int(0)]).expect_err("wrong type");
        assert_eq!(kind.to_string(), "argument 1 must be str, not int");
        assert!(kind.is_argument_mismatch());

        validate_args(&sig, &[Value::from("x"), Value::Int(0)]).expect("matching args");
    }

    #[test]
    fn null_result_passes_any_declared_return() {
        let sig = Signature::nullary(ValueTag::Map);
        check_result(&sig, &Value::Null).expect("null means no data");
        check_result(&sig, &Value::map::<&str, _>([])).expect("map matches");
        let err = check_result(&sig, &Value::Int(3)).expect_err("int is not map");
        assert_eq!(
            err,
            MarshalError::ResultType {
                expected: ValueTag::Map,
                got: ValueTag::Int
            }
        );
    }
}
