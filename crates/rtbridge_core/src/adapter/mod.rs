//! Capability adapters.
//!
//! # Responsibility
//! - Provide the interpreter-visible callable behind one capability.
//! - Route each call through marshaling, registry lookup, signature checks
//!   and the native callback, and turn every failure into a `ScriptError`.
//!
//! # Invariants
//! - The registry is consulted on every call; nothing is cached, so callbacks
//!   registered or replaced after import are picked up immediately.
//! - A panicking callback never unwinds into interpreter code.
//!
//! # See also
//! - `crate::abi` for how adapters are bound into modules.

use crate::interp::error::{ExceptionKind, ScriptError};
use crate::interp::lock::CallContext;
use crate::interp::object::Object;
use crate::logging::{panic_payload, sanitize_message};
use crate::marshal::{check_result, marshal_args, to_native, validate_args};
use crate::model::capability::CapabilityName;
use crate::model::value::Value;
use crate::registry::{CallbackEntry, CallbackRegistry};
use log::{debug, warn};
use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Rewrites interpreter arguments before they are marshaled.
pub type ArgTransform = dyn Fn(&[Object]) -> Result<Vec<Object>, ScriptError> + Send + Sync;

/// Rewrites the interpreter object built from a callback result.
pub type ResultTransform = dyn Fn(Object) -> Object + Send + Sync;

const MAX_PANIC_MESSAGE_CHARS: usize = 160;

/// Interpreter-side entry point for one capability.
#[derive(Clone)]
pub struct CapabilityAdapter {
    capability: CapabilityName,
    registry: Arc<CallbackRegistry>,
    transform: Option<Arc<ArgTransform>>,
    result_transform: Option<Arc<ResultTransform>>,
}

impl CapabilityAdapter {
    pub fn new(capability: CapabilityName, registry: Arc<CallbackRegistry>) -> Self {
        Self {
            capability,
            registry,
            transform: None,
            result_transform: None,
        }
    }

    /// Installs an argument transform that runs before marshaling.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&[Object]) -> Result<Vec<Object>, ScriptError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Installs a transform applied to the converted result.
    pub fn with_result_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Object) -> Object + Send + Sync + 'static,
    {
        self.result_transform = Some(Arc::new(transform));
        self
    }

    pub fn capability(&self) -> &CapabilityName {
        &self.capability
    }

    /// Runs one call from interpreter code.
    ///
    /// # Errors
    /// - `ArgumentMismatch` when arguments do not fit the registered signature.
    /// - `MarshalingFailure` when an argument or the result cannot cross.
    /// - `CapabilityNotRegistered` when no callback is installed right now.
    /// - `CallbackFailure` when the callback returns an error or panics.
    /// - Whatever the argument transform raises.
    pub fn invoke(
        &self,
        ctx: &mut CallContext<'_, '_>,
        args: &[Object],
    ) -> Result<Object, ScriptError> {
        let name = self.capability.as_str();
        let args: Cow<'_, [Object]> = match &self.transform {
            Some(transform) => Cow::Owned(transform(args)?),
            None => Cow::Borrowed(args),
        };

        let values = marshal_args(&args).map_err(|err| self.tagged(err.into()))?;
        let entry = self.registry.lookup(name)?;
        validate_args(entry.signature(), &values).map_err(|err| self.tagged(err.into()))?;

        let outcome = if entry.options().releases_execution_lock {
            ctx.allow_threads(|| call_guarded(&entry, &values))
        } else {
            call_guarded(&entry, &values)
        };
        let result = match outcome {
            Ok(result) => result,
            Err(message) => {
                warn!(
                    "event=capability_invoke module=adapter status=error capability={} generation={} error_code=callback_failure",
                    name,
                    ctx.generation()
                );
                return Err(self.tagged(ScriptError::new(ExceptionKind::CallbackFailure, message)));
            }
        };

        check_result(entry.signature(), &result).map_err(|err| self.tagged(err.into()))?;
        debug!(
            "event=capability_invoke module=adapter status=ok capability={} generation={} args={} registration={}",
            name,
            ctx.generation(),
            values.len(),
            entry.generation()
        );
        let object = to_native(&result);
        Ok(match &self.result_transform {
            Some(transform) => transform(object),
            None => object,
        })
    }

    fn tagged(&self, err: ScriptError) -> ScriptError {
        err.with_capability(self.capability.as_str())
    }
}

impl Debug for CapabilityAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityAdapter")
            .field("capability", &self.capability)
            .field("transform", &self.transform.is_some())
            .field("result_transform", &self.result_transform.is_some())
            .finish()
    }
}

fn call_guarded(entry: &CallbackEntry, values: &[Value]) -> Result<Value, String> {
    match catch_unwind(AssertUnwindSafe(|| entry.invoke(values))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.message),
        Err(payload) => Err(format!(
            "native callback panicked: {}",
            sanitize_message(&panic_payload(&*payload), MAX_PANIC_MESSAGE_CHARS)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::CapabilityAdapter;
    use crate::abi::ACTIVE_GENERATION;
    use crate::interp::error::{ExceptionKind, ScriptError};
    use crate::interp::lock::{CallContext, ExecutionLock};
    use crate::interp::object::Object;
    use crate::model::capability::CapabilityName;
    use crate::model::signature::Signature;
    use crate::model::value::{Value, ValueTag};
    use crate::registry::{CallbackError, CallbackRegistry};
    use std::sync::Arc;

    fn adapter(registry: &Arc<CallbackRegistry>, name: &str) -> CapabilityAdapter {
        CapabilityAdapter::new(
            CapabilityName::parse(name).expect("valid name"),
            registry.clone(),
        )
    }

    fn run(adapter: &CapabilityAdapter, args: &[Object]) -> Result<Object, ScriptError> {
        let lock = ExecutionLock::new();
        let mut guard = lock.acquire();
        let mut ctx = CallContext::new(&mut guard, ACTIVE_GENERATION);
        adapter.invoke(&mut ctx, args)
    }

    #[test]
    fn resolves_callback_registered_after_binding() {
        let registry = Arc::new(CallbackRegistry::new());
        let echo = adapter(&registry, "echo");

        let err = run(&echo, &[Object::str("x")]).expect_err("nothing registered yet");
        assert!(err.is(ExceptionKind::CapabilityNotRegistered));

        registry
            .register(
                "echo",
                Signature::new(vec![ValueTag::Str], ValueTag::Str),
                |args: &[Value]| Ok(args[0].clone()),
            )
            .expect("register");
        let result = run(&echo, &[Object::str("x")]).expect("echo call");
        assert_eq!(result, Object::str("x"));
    }

    #[test]
    fn callback_error_and_panic_become_callback_failure() {
        let registry = Arc::new(CallbackRegistry::new());
        registry
            .register("fails", Signature::nullary(ValueTag::Int), |_: &[Value]| {
                Err(CallbackError::new("backend unavailable"))
            })
            .expect("register");
        registry
            .register("panics", Signature::nullary(ValueTag::Int), |_: &[Value]| {
                panic!("boom")
            })
            .expect("register");

        let failed = run(&adapter(&registry, "fails"), &[]).expect_err("error result");
        assert!(failed.is(ExceptionKind::CallbackFailure));
        assert_eq!(failed.message, "backend unavailable");
        assert_eq!(failed.capability.as_deref(), Some("fails"));

        let panicked = run(&adapter(&registry, "panics"), &[]).expect_err("panic result");
        assert!(panicked.is(ExceptionKind::CallbackFailure));
        assert!(panicked.message.contains("boom"));
    }

    #[test]
    fn transform_runs_before_signature_check() {
        let registry = Arc::new(CallbackRegistry::new());
        registry
            .register(
                "double",
                Signature::new(vec![ValueTag::Int], ValueTag::Int),
                |args: &[Value]| match args {
                    [Value::Int(n)] => Ok(Value::Int(n * 2)),
                    _ => Err(CallbackError::new("unexpected args")),
                },
            )
            .expect("register");

        let from_bool = adapter(&registry, "double").with_transform(|args: &[Object]| {
            Ok(args
                .iter()
                .map(|arg| match arg {
                    Object::Bool(flag) => Object::Int(i64::from(*flag)),
                    other => other.clone(),
                })
                .collect())
        });
        assert_eq!(
            run(&from_bool, &[Object::Bool(true)]).expect("transformed"),
            Object::Int(2)
        );

        let err = run(&from_bool, &[Object::str("1")]).expect_err("str is not int");
        assert!(err.is(ExceptionKind::ArgumentMismatch));
        assert_eq!(err.message, "argument 1 must be int, not str");
    }
}
