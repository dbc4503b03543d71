//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `rtbridge_core` linkage.
//! - Start file logging when `RTBRIDGE_LOG_DIR` is set.
//! - Exercise one registered callback through a builtin module.
//! - Keep output deterministic for quick local sanity checks.

use rtbridge_core::{
    from_native, CallbackRegistry, Interpreter, InterpreterConfig, Signature, Value, ValueTag,
    CAPABILITY_CONNECTION_INFO,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match rtbridge_core::init_logging_from_env() {
        Ok(started) => println!("rtbridge_core logging={started}"),
        Err(err) => eprintln!("logging disabled: {err}"),
    }
    println!("rtbridge_core version={}", rtbridge_core::core_version());
    println!("rtbridge_core generation={}", rtbridge_core::ACTIVE_GENERATION);

    match connection_info_roundtrip() {
        Ok(document) => {
            println!("kubeutil.get_connection_info={document}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("connection info round trip failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn connection_info_roundtrip() -> Result<String, String> {
    let registry = Arc::new(CallbackRegistry::new());
    registry
        .register(
            CAPABILITY_CONNECTION_INFO,
            Signature::nullary(ValueTag::Map),
            |_: &[Value]| {
                Ok(Value::map([
                    ("host", Value::from("127.0.0.1")),
                    ("port", Value::Int(1234)),
                ]))
            },
        )
        .map_err(|err| err.to_string())?;

    let config = InterpreterConfig::from_env()?;
    let mut interp = Interpreter::with_builtins(registry, config);
    let result = interp
        .call("kubeutil", "get_connection_info", &[])
        .map_err(|err| err.to_string())?;
    let value = from_native(&result).map_err(|err| err.to_string())?;
    let json = value.to_json().map_err(|err| err.to_string())?;
    serde_json::to_string(&json).map_err(|err| err.to_string())
}
