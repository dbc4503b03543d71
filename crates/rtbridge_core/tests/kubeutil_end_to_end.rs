use rtbridge_core::{
    CallbackError, CallbackRegistry, ExceptionKind, Interpreter, InterpreterConfig, Object,
    Signature, Value, ValueTag, CAPABILITY_CONNECTION_INFO,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn connection_signature() -> Signature {
    Signature::parse("() -> map").unwrap()
}

fn interpreter(registry: &Arc<CallbackRegistry>) -> Interpreter {
    Interpreter::with_builtins(registry.clone(), InterpreterConfig::default())
}

#[test]
fn returns_registered_connection_info() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            |_: &[Value]| {
                Ok(Value::map([
                    ("host", Value::from("127.0.0.1")),
                    ("port", Value::Int(1234)),
                ]))
            },
        )
        .unwrap();

    let mut interp = interpreter(&registry);
    let info = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();

    assert_eq!(info.dict_get("host"), Some(&Object::str("127.0.0.1")));
    assert_eq!(info.dict_get("port"), Some(&Object::Int(1234)));
}

#[test]
fn callback_registered_after_import_is_used() {
    let registry = Arc::new(CallbackRegistry::new());
    let mut interp = interpreter(&registry);
    interp.import("kubeutil").unwrap();

    let err = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap_err();
    assert!(err.is(ExceptionKind::CapabilityNotRegistered));
    assert_eq!(err.capability.as_deref(), Some(CAPABILITY_CONNECTION_INFO));

    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            |_: &[Value]| Ok(Value::map([("host", Value::from("10.0.0.1"))])),
        )
        .unwrap();
    let info = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();
    assert_eq!(info.dict_get("host"), Some(&Object::str("10.0.0.1")));
}

#[test]
fn unregister_makes_calls_fail_cleanly() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            |_: &[Value]| Ok(Value::map::<&str, _>([])),
        )
        .unwrap();
    let mut interp = interpreter(&registry);
    interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();

    assert!(registry.unregister(CAPABILITY_CONNECTION_INFO));
    let err = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap_err();
    assert!(err.is(ExceptionKind::CapabilityNotRegistered));
    assert!(err.to_string().starts_with("CapabilityNotRegistered: "));
}

#[test]
fn null_result_becomes_empty_dict() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            |_: &[Value]| Ok(Value::Null),
        )
        .unwrap();

    let mut interp = interpreter(&registry);
    let info = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();
    assert_eq!(info, Object::Dict(Vec::new()));
}

#[test]
fn extra_argument_is_argument_mismatch() {
    let registry = Arc::new(CallbackRegistry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            move |_: &[Value]| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            },
        )
        .unwrap();

    let mut interp = interpreter(&registry);
    let err = interp
        .call("kubeutil", "get_connection_info", &[Object::Int(1)])
        .unwrap_err();
    assert!(err.is(ExceptionKind::ArgumentMismatch));
    assert_eq!(err.message, "expected 0 argument(s), got 1");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "callback must not run");
}

#[test]
fn wrong_result_shape_is_marshaling_failure() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            connection_signature(),
            |_: &[Value]| Ok(Value::from("127.0.0.1:1234")),
        )
        .unwrap();

    let mut interp = interpreter(&registry);
    let err = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap_err();
    assert!(err.is(ExceptionKind::MarshalingFailure));
}

#[test]
fn callback_failure_is_catchable() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            Signature::nullary(ValueTag::Map),
            |_: &[Value]| Err(CallbackError::new("kubelet unreachable")),
        )
        .unwrap();

    let mut interp = interpreter(&registry);
    let err = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap_err();
    assert_eq!(err.to_string(), "CallbackFailure: kubelet unreachable");

    // The interpreter stays usable after a failed call.
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            Signature::nullary(ValueTag::Map),
            |_: &[Value]| Ok(Value::Null),
        )
        .unwrap();
    interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();
}
