//! Core of the runtime bridge.
//! Registry, marshaling, adapters and the embedding model live here; the C
//! surface in `rtbridge_ffi` is a thin shell over this crate.

pub mod abi;
pub mod adapter;
pub mod builtins;
pub mod interp;
pub mod logging;
pub mod marshal;
pub mod model;
pub mod registry;

pub use abi::{GenerationAbi, InitFn, InterpreterGeneration, ModuleDef, ACTIVE_GENERATION};
pub use adapter::CapabilityAdapter;
pub use interp::{
    CallContext, ExceptionKind, ExecutionLock, Interpreter, InterpreterConfig, ModuleHandle,
    Object, ScriptError,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_env, logging_status, LogLevel,
};
pub use marshal::{
    check_result, from_native, marshal_args, to_native, validate_args, MarshalError,
};
pub use model::capability::{
    CapabilityName, CapabilityNameError, CAPABILITY_CONNECTION_INFO, CAPABILITY_TAGS,
};
pub use model::signature::{Signature, SignatureParseError};
pub use model::value::{Value, ValueTag};
pub use registry::{
    CallbackEntry, CallbackError, CallbackOptions, CallbackRegistry, NativeFn, RegistryError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
