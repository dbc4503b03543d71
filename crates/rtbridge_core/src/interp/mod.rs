//! Minimal embedding model of one interpreter instance.
//!
//! # Responsibility
//! - Own the init table, the module table, the error indicator and the
//!   execution lock of one interpreter.
//! - Run module initializers through the active generation's import protocol.
//! - Dispatch calls from the host into module functions.
//!
//! # Invariants
//! - A module is imported at most once; later imports return the same handle.
//! - After `finalize`, no module can be created or imported and the callback
//!   registry is empty.
//! - Module functions only run while the execution lock is held.
//!
//! # See also
//! - `crate::abi` for the per-generation import protocol.

pub mod config;
pub mod error;
pub mod lock;
pub mod module;
pub mod object;

pub use config::InterpreterConfig;
pub use error::{ExceptionKind, ScriptError};
pub use lock::{CallContext, ExecutionLock};
pub use module::{BuiltinFunction, CallFn, ModuleHandle};
pub use object::Object;

use crate::abi::{ActiveAbi, GenerationAbi, InitFn, InterpreterGeneration, ACTIVE_GENERATION};
use crate::builtins;
use crate::registry::CallbackRegistry;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// One embedded interpreter instance.
pub struct Interpreter {
    id: Uuid,
    registry: Arc<CallbackRegistry>,
    config: InterpreterConfig,
    inittab: BTreeMap<String, InitFn>,
    modules: BTreeMap<String, ModuleHandle>,
    error: Option<ScriptError>,
    lock: ExecutionLock,
    finalized: bool,
}

impl Interpreter {
    /// Creates an interpreter with an empty init table.
    pub fn new(registry: Arc<CallbackRegistry>, config: InterpreterConfig) -> Self {
        let id = Uuid::new_v4();
        info!(
            "event=interp_init module=interp status=ok interp_id={} generation={} max_modules={}",
            id, ACTIVE_GENERATION, config.max_modules
        );
        Self {
            id,
            registry,
            config,
            inittab: BTreeMap::new(),
            modules: BTreeMap::new(),
            error: None,
            lock: ExecutionLock::new(),
            finalized: false,
        }
    }

    /// Creates an interpreter whose init table holds the builtin modules.
    pub fn with_builtins(registry: Arc<CallbackRegistry>, config: InterpreterConfig) -> Self {
        let mut interp = Self::new(registry, config);
        for (name, init) in builtins::default_inittab() {
            interp.inittab.insert(name.to_string(), init);
        }
        interp
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> InterpreterGeneration {
        ACTIVE_GENERATION
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn execution_lock(&self) -> &ExecutionLock {
        &self.lock
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Adds a module initializer to the init table.
    ///
    /// # Errors
    /// - `ImportError` when the interpreter is finalized, the name is empty,
    ///   or the name is already present.
    pub fn append_inittab(&mut self, name: &str, init: InitFn) -> Result<(), ScriptError> {
        let name = name.trim();
        if self.finalized {
            return Err(finalized_error());
        }
        if name.is_empty() {
            return Err(ScriptError::new(
                ExceptionKind::ImportError,
                "init table entries need a module name",
            ));
        }
        if self.inittab.contains_key(name) {
            return Err(ScriptError::new(
                ExceptionKind::ImportError,
                format!("init table already has an entry for '{name}'"),
            ));
        }
        self.inittab.insert(name.to_string(), init);
        Ok(())
    }

    /// Sorted module names the init table can import.
    pub fn inittab_names(&self) -> Vec<String> {
        self.inittab.keys().cloned().collect()
    }

    /// Imports `name`, running its initializer on first import.
    ///
    /// # Errors
    /// - `ImportError` for unknown modules or a finalized interpreter.
    /// - Whatever the initializer reports, typically `ModuleInitFailure`.
    pub fn import(&mut self, name: &str) -> Result<ModuleHandle, ScriptError> {
        if self.finalized {
            return Err(finalized_error());
        }
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let Some(init) = self.inittab.get(name).copied() else {
            return Err(ScriptError::new(
                ExceptionKind::ImportError,
                format!("No module named '{name}'"),
            ));
        };
        if let Some(stale) = self.error.take() {
            debug!(
                "event=module_init module=interp status=start interp_id={} module_name={} dropped_error={}",
                self.id,
                name,
                stale.kind
            );
        }

        match ActiveAbi::run_initializer(self, name, init) {
            Ok(module) => {
                info!(
                    "event=module_init module=interp status=ok interp_id={} module_name={} generation={} functions={}",
                    self.id,
                    name,
                    ACTIVE_GENERATION,
                    module.function_names().len()
                );
                Ok(module)
            }
            Err(err) => {
                warn!(
                    "event=module_init module=interp status=error interp_id={} module_name={} error_code={}",
                    self.id, name, err.kind
                );
                Err(err)
            }
        }
    }

    /// Returns an already imported module.
    pub fn module(&self, name: &str) -> Option<ModuleHandle> {
        self.modules.get(name).cloned()
    }

    /// Sorted names of imported modules.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Imports `module` and calls its attribute `function` with `args`.
    ///
    /// # Errors
    /// - `AttributeError` when the module lacks `function`.
    /// - `TypeError` when the attribute is not callable.
    /// - Anything the import or the function raises.
    pub fn call(
        &mut self,
        module: &str,
        function: &str,
        args: &[Object],
    ) -> Result<Object, ScriptError> {
        let handle = self.import(module)?;
        let target = match handle.get(function) {
            Some(Object::Function(target)) => target,
            Some(other) => {
                return Err(ScriptError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )))
            }
            None => {
                return Err(ScriptError::new(
                    ExceptionKind::AttributeError,
                    format!("module '{module}' has no attribute '{function}'"),
                ))
            }
        };

        let lock = self.lock.clone();
        let mut guard = lock.acquire();
        let mut ctx = CallContext::new(&mut guard, ACTIVE_GENERATION);
        target.call(&mut ctx, args)
    }

    /// Sets the error indicator, replacing any pending error.
    pub fn set_error(&mut self, err: ScriptError) {
        self.error = Some(err);
    }

    pub fn err_occurred(&self) -> bool {
        self.error.is_some()
    }

    /// Pending error, if any, without clearing it.
    pub fn error(&self) -> Option<&ScriptError> {
        self.error.as_ref()
    }

    /// Clears and returns the error indicator.
    pub fn take_error(&mut self) -> Option<ScriptError> {
        self.error.take()
    }

    /// Drops every module and clears the callback registry. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let modules = self.modules.len();
        self.modules.clear();
        self.error = None;
        let callbacks = self.registry.clear();
        info!(
            "event=interp_finalize module=interp status=ok interp_id={} modules={} callbacks={}",
            self.id, modules, callbacks
        );
    }

    /// Creates an unregistered module owned by this interpreter.
    pub(crate) fn new_module(
        &mut self,
        name: &str,
        doc: &str,
    ) -> Result<ModuleHandle, ScriptError> {
        if self.finalized {
            return Err(ScriptError::module_init(format!(
                "cannot create module '{name}': interpreter is finalized"
            )));
        }
        if name.trim().is_empty() {
            return Err(ScriptError::module_init("module name must not be empty"));
        }
        if self.modules.len() >= self.config.max_modules {
            return Err(ScriptError::module_init(format!(
                "cannot create module '{name}': module table is full ({} modules)",
                self.config.max_modules
            )));
        }
        Ok(ModuleHandle::new(name, doc, self.id))
    }

    pub(crate) fn register_module(
        &mut self,
        name: &str,
        module: ModuleHandle,
    ) -> Result<(), ScriptError> {
        if self.finalized {
            return Err(ScriptError::module_init(format!(
                "cannot register module '{name}': interpreter is finalized"
            )));
        }
        if module.owner() != self.id {
            return Err(ScriptError::module_init(format!(
                "module '{name}' belongs to another interpreter"
            )));
        }
        self.modules.insert(name.to_string(), module);
        Ok(())
    }

    #[cfg(feature = "generation-b")]
    pub(crate) fn remove_module(&mut self, name: &str) -> Option<ModuleHandle> {
        self.modules.remove(name)
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn finalized_error() -> ScriptError {
    ScriptError::new(ExceptionKind::ImportError, "interpreter is finalized")
}

#[cfg(test)]
mod tests {
    use super::{ExceptionKind, Interpreter, InterpreterConfig, ScriptError};
    use crate::model::signature::Signature;
    use crate::model::value::{Value, ValueTag};
    use crate::registry::CallbackRegistry;
    use std::sync::Arc;

    fn builtins() -> Interpreter {
        Interpreter::with_builtins(
            Arc::new(CallbackRegistry::new()),
            InterpreterConfig::default(),
        )
    }

    #[test]
    fn import_is_cached() {
        let mut interp = builtins();
        let first = interp.import("kubeutil").expect("first import");
        let second = interp.import("kubeutil").expect("second import");
        assert!(first.ptr_eq(&second));
        assert_eq!(first.owner(), interp.id());
    }

    #[test]
    fn unknown_module_is_import_error() {
        let mut interp = builtins();
        let err = interp.import("nope").expect_err("unknown module");
        assert!(err.is(ExceptionKind::ImportError));
        assert_eq!(err.message, "No module named 'nope'");
    }

    #[test]
    fn call_reports_missing_and_non_callable_attributes() {
        let mut interp = builtins();
        let missing = interp
            .call("kubeutil", "missing", &[])
            .expect_err("missing attribute");
        assert!(missing.is(ExceptionKind::AttributeError));

        let constant = interp.call("tagger", "LOW", &[]).expect_err("int attribute");
        assert!(constant.is(ExceptionKind::TypeError));
        assert_eq!(constant.message, "'int' object is not callable");
    }

    #[test]
    fn finalize_clears_registry_and_blocks_imports() {
        let registry = Arc::new(CallbackRegistry::new());
        registry
            .register("tags", Signature::nullary(ValueTag::List), |_: &[Value]| {
                Ok(Value::List(Vec::new()))
            })
            .expect("register");
        let mut interp =
            Interpreter::with_builtins(registry.clone(), InterpreterConfig::default());
        interp.import("tagger").expect("import");

        interp.finalize();
        interp.finalize();
        assert!(interp.is_finalized());
        assert!(registry.is_empty());
        assert!(interp.module_names().is_empty());
        let err = interp.import("tagger").expect_err("finalized");
        assert!(err.is(ExceptionKind::ImportError));
    }

    #[test]
    fn drop_finalizes() {
        let registry = Arc::new(CallbackRegistry::new());
        registry
            .register("tags", Signature::nullary(ValueTag::List), |_: &[Value]| {
                Ok(Value::Null)
            })
            .expect("register");
        drop(Interpreter::new(registry.clone(), InterpreterConfig::default()));
        assert!(registry.is_empty());
    }

    #[test]
    fn error_indicator_is_cleared_by_take() {
        let mut interp = builtins();
        assert!(!interp.err_occurred());
        interp.set_error(ScriptError::type_error("boom"));
        assert!(interp.err_occurred());
        assert_eq!(
            interp.take_error().map(|err| err.kind),
            Some(ExceptionKind::TypeError)
        );
        assert!(!interp.err_occurred());
    }
}
