use rtbridge_core::builtins::tagger::{HIGH, LOW, ORCHESTRATOR};
use rtbridge_core::{
    CallbackError, CallbackRegistry, ExceptionKind, Interpreter, InterpreterConfig, Object,
    Signature, Value, CAPABILITY_TAGS,
};
use std::sync::Arc;

fn tags_for(entity: &str, cardinality: i64) -> Vec<&'static str> {
    if entity != "container_id://123" {
        return Vec::new();
    }
    match cardinality {
        LOW => vec!["low1", "low2"],
        ORCHESTRATOR => vec!["low1", "low2", "orchestrator1"],
        HIGH => vec!["low1", "low2", "orchestrator1", "high1"],
        _ => Vec::new(),
    }
}

fn interpreter_with_tagger() -> Interpreter {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_TAGS,
            Signature::parse("(str, int) -> list").unwrap(),
            |args: &[Value]| match args {
                [Value::Str(entity), Value::Int(cardinality)] => Ok(Value::List(
                    tags_for(entity, *cardinality)
                        .into_iter()
                        .map(Value::from)
                        .collect(),
                )),
                _ => Err(CallbackError::new("unexpected tagger arguments")),
            },
        )
        .unwrap();
    Interpreter::with_builtins(registry, InterpreterConfig::default())
}

fn strs(items: &[&str]) -> Object {
    Object::List(items.iter().map(|item| Object::str(*item)).collect())
}

#[test]
fn exposes_cardinality_constants() {
    let mut interp = interpreter_with_tagger();
    let module = interp.import("tagger").unwrap();
    assert_eq!(module.get("LOW"), Some(Object::Int(0)));
    assert_eq!(module.get("ORCHESTRATOR"), Some(Object::Int(1)));
    assert_eq!(module.get("HIGH"), Some(Object::Int(2)));
}

#[test]
fn tag_returns_tags_per_cardinality() {
    let mut interp = interpreter_with_tagger();
    let entity = Object::str("container_id://123");

    let low = interp
        .call("tagger", "tag", &[entity.clone(), Object::Int(LOW)])
        .unwrap();
    assert_eq!(low, strs(&["low1", "low2"]));

    let orchestrator = interp
        .call("tagger", "tag", &[entity.clone(), Object::Int(ORCHESTRATOR)])
        .unwrap();
    assert_eq!(orchestrator, strs(&["low1", "low2", "orchestrator1"]));

    let high = interp
        .call("tagger", "tag", &[entity, Object::Int(HIGH)])
        .unwrap();
    assert_eq!(high, strs(&["low1", "low2", "orchestrator1", "high1"]));
}

#[test]
fn get_tags_maps_high_card_flag() {
    let mut interp = interpreter_with_tagger();
    let entity = Object::str("container_id://123");

    let low = interp
        .call("tagger", "get_tags", &[entity.clone(), Object::Bool(false)])
        .unwrap();
    assert_eq!(low, strs(&["low1", "low2"]));

    let high = interp
        .call("tagger", "get_tags", &[entity, Object::Bool(true)])
        .unwrap();
    assert_eq!(high, strs(&["low1", "low2", "orchestrator1", "high1"]));
}

#[test]
fn unknown_entity_yields_empty_list() {
    let mut interp = interpreter_with_tagger();
    let tags = interp
        .call(
            "tagger",
            "tag",
            &[Object::str("container_id://404"), Object::Int(LOW)],
        )
        .unwrap();
    assert_eq!(tags, Object::List(Vec::new()));
}

#[test]
fn none_from_host_yields_empty_list() {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_TAGS,
            Signature::parse("(str, int) -> list").unwrap(),
            |_: &[Value]| Ok(Value::Null),
        )
        .unwrap();
    let mut interp = Interpreter::with_builtins(registry, InterpreterConfig::default());
    let tags = interp
        .call("tagger", "get_tags", &[Object::str("x"), Object::Bool(true)])
        .unwrap();
    assert_eq!(tags, Object::List(Vec::new()));
}

#[test]
fn invalid_cardinality_is_type_error() {
    let mut interp = interpreter_with_tagger();
    let err = interp
        .call(
            "tagger",
            "tag",
            &[Object::str("container_id://123"), Object::Int(-1)],
        )
        .unwrap_err();
    assert!(err.is(ExceptionKind::TypeError));
    assert_eq!(err.to_string(), "TypeError: Invalid cardinality");
}

#[test]
fn wrong_entity_type_is_argument_mismatch() {
    let mut interp = interpreter_with_tagger();
    let err = interp
        .call("tagger", "tag", &[Object::Int(1), Object::Int(LOW)])
        .unwrap_err();
    assert!(err.is(ExceptionKind::ArgumentMismatch));
    assert_eq!(err.message, "argument 1 must be str, not int");
}

#[test]
fn tag_accepts_bool_cardinality_as_int() {
    let mut interp = interpreter_with_tagger();
    let tags = interp
        .call(
            "tagger",
            "tag",
            &[Object::str("container_id://123"), Object::Bool(true)],
        )
        .unwrap();
    assert_eq!(tags, strs(&["low1", "low2", "orchestrator1"]));
}
