//! Behavior every interpreter generation must share. Runs against whichever
//! generation this build compiles.

use rtbridge_core::builtins::kubeutil;
use rtbridge_core::{
    CallbackRegistry, ExceptionKind, InitFn, Interpreter, InterpreterConfig,
    InterpreterGeneration, Object, Signature, Value, ACTIVE_GENERATION,
    CAPABILITY_CONNECTION_INFO, CAPABILITY_TAGS,
};
use std::sync::Arc;

fn registry_with_callbacks() -> Arc<CallbackRegistry> {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            Signature::parse("() -> map").unwrap(),
            |_: &[Value]| Ok(Value::map([("port", Value::Int(1234))])),
        )
        .unwrap();
    registry
        .register(
            CAPABILITY_TAGS,
            Signature::parse("(str, int) -> list").unwrap(),
            |args: &[Value]| Ok(Value::List(args.to_vec())),
        )
        .unwrap();
    registry
}

#[test]
fn interpreter_reports_compiled_generation() {
    let interp = Interpreter::new(
        Arc::new(CallbackRegistry::new()),
        InterpreterConfig::default(),
    );
    assert_eq!(interp.generation(), ACTIVE_GENERATION);
    let expected = if cfg!(feature = "generation-b") {
        InterpreterGeneration::GenerationB
    } else {
        InterpreterGeneration::GenerationA
    };
    assert_eq!(ACTIVE_GENERATION, expected);
}

#[test]
fn builtin_modules_have_identical_surface() {
    let mut interp =
        Interpreter::with_builtins(registry_with_callbacks(), InterpreterConfig::default());
    assert_eq!(
        interp.inittab_names(),
        vec!["kubeutil".to_string(), "tagger".to_string()]
    );

    let kubeutil = interp.import("kubeutil").unwrap();
    assert_eq!(kubeutil.name(), "kubeutil");
    assert_eq!(
        kubeutil.function_names(),
        vec!["get_connection_info".to_string()]
    );

    let tagger = interp.import("tagger").unwrap();
    assert_eq!(
        tagger.function_names(),
        vec!["get_tags".to_string(), "tag".to_string()]
    );
    assert_eq!(
        tagger.attribute_names(),
        vec![
            "HIGH".to_string(),
            "LOW".to_string(),
            "ORCHESTRATOR".to_string(),
            "get_tags".to_string(),
            "tag".to_string(),
        ]
    );
    assert!(!tagger.doc().is_empty());
}

#[test]
fn call_results_have_identical_shape() {
    let mut interp =
        Interpreter::with_builtins(registry_with_callbacks(), InterpreterConfig::default());

    let info = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();
    assert_eq!(
        info,
        Object::Dict(vec![(Object::str("port"), Object::Int(1234))])
    );

    let echoed = interp
        .call("tagger", "tag", &[Object::str("pod"), Object::Int(1)])
        .unwrap();
    assert_eq!(
        echoed,
        Object::List(vec![Object::str("pod"), Object::Int(1)])
    );
}

#[test]
fn error_kinds_are_identical() {
    let mut interp = Interpreter::with_builtins(
        Arc::new(CallbackRegistry::new()),
        InterpreterConfig::default(),
    );
    let missing = interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap_err();
    assert!(missing.is(ExceptionKind::CapabilityNotRegistered));

    let import = interp.import("datadog_agent").unwrap_err();
    assert!(import.is(ExceptionKind::ImportError));
}

#[test]
fn exhausted_module_table_is_module_init_failure() {
    let mut interp = Interpreter::with_builtins(
        registry_with_callbacks(),
        InterpreterConfig { max_modules: 1 },
    );
    interp.import("kubeutil").unwrap();

    let err = interp.import("tagger").unwrap_err();
    assert!(err.is(ExceptionKind::ModuleInitFailure));
    assert!(err.message.contains("module table is full"));
    assert!(!interp.err_occurred(), "error indicator is consumed by import");
    assert_eq!(interp.module_names(), vec!["kubeutil".to_string()]);

    // Earlier modules keep working.
    interp
        .call("kubeutil", "get_connection_info", &[])
        .unwrap();
}

#[test]
fn appended_inittab_entries_use_the_same_protocol() {
    let mut interp = Interpreter::new(registry_with_callbacks(), InterpreterConfig::default());
    assert!(interp.import("tagger").unwrap_err().is(ExceptionKind::ImportError));

    let (name, init) = rtbridge_core::builtins::default_inittab()
        .into_iter()
        .find(|(name, _)| *name == "tagger")
        .unwrap();
    interp.append_inittab(name, init).unwrap();
    let duplicate = interp.append_inittab(name, init).unwrap_err();
    assert!(duplicate.is(ExceptionKind::ImportError));

    let tagger = interp.import("tagger").unwrap();
    assert_eq!(tagger.get("HIGH"), Some(Object::Int(2)));
}

#[test]
fn aliased_inittab_entry_is_installed_under_the_import_name() {
    let mut interp = Interpreter::new(
        registry_with_callbacks(),
        InterpreterConfig { max_modules: 1 },
    );
    interp
        .append_inittab("alias", kubeutil::init_kubeutil as InitFn)
        .unwrap();

    let module = interp.import("alias").unwrap();
    assert_eq!(module.name(), "kubeutil");
    assert_eq!(interp.module_names(), vec!["alias".to_string()]);

    let info = interp.call("alias", "get_connection_info", &[]).unwrap();
    assert_eq!(info.dict_get("port"), Some(&Object::Int(1234)));
}

#[test]
fn failed_import_leaves_the_module_table_unchanged() {
    let mut interp = Interpreter::new(
        registry_with_callbacks(),
        InterpreterConfig { max_modules: 1 },
    );
    interp
        .append_inittab("alias", kubeutil::init_kubeutil as InitFn)
        .unwrap();
    interp
        .append_inittab("other", kubeutil::init_kubeutil as InitFn)
        .unwrap();
    interp.import("alias").unwrap();

    let err = interp.import("other").unwrap_err();
    assert!(err.is(ExceptionKind::ModuleInitFailure));
    assert_eq!(interp.module_names(), vec!["alias".to_string()]);
}
