//! Module objects and builtin functions.
//!
//! # Responsibility
//! - Represent installed modules and the callables they expose.
//!
//! # Invariants
//! - Attribute names are unique within one module.
//! - A module belongs to exactly one interpreter (`owner`).

use super::error::ScriptError;
use super::lock::CallContext;
use super::object::Object;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Uniform call shape every generation's binding reduces to.
pub type CallFn =
    dyn Fn(&mut CallContext<'_, '_>, &[Object]) -> Result<Object, ScriptError> + Send + Sync;

/// Interpreter-visible builtin callable.
#[derive(Clone)]
pub struct BuiltinFunction {
    name: Arc<str>,
    doc: Arc<str>,
    call: Arc<CallFn>,
}

impl BuiltinFunction {
    pub fn new(name: &str, doc: &str, call: Arc<CallFn>) -> Self {
        Self {
            name: Arc::from(name),
            doc: Arc::from(doc),
            call,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn call(
        &self,
        ctx: &mut CallContext<'_, '_>,
        args: &[Object],
    ) -> Result<Object, ScriptError> {
        (self.call)(ctx, args)
    }
}

impl Debug for BuiltinFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

impl PartialEq for BuiltinFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

struct ModuleObject {
    name: String,
    doc: String,
    owner: Uuid,
    attrs: RwLock<BTreeMap<String, Object>>,
}

/// Shared handle to an installed module.
#[derive(Clone)]
pub struct ModuleHandle {
    inner: Arc<ModuleObject>,
}

impl ModuleHandle {
    pub(crate) fn new(name: &str, doc: &str, owner: Uuid) -> Self {
        Self {
            inner: Arc::new(ModuleObject {
                name: name.to_string(),
                doc: doc.to_string(),
                owner,
                attrs: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn doc(&self) -> &str {
        &self.inner.doc
    }

    /// Id of the interpreter that created this module.
    pub fn owner(&self) -> Uuid {
        self.inner.owner
    }

    /// Adds one attribute; duplicates are rejected.
    pub fn add_object(&self, name: &str, value: Object) -> Result<(), ScriptError> {
        if name.trim().is_empty() {
            return Err(ScriptError::module_init(format!(
                "module '{}' cannot bind an empty attribute name",
                self.name()
            )));
        }
        let mut attrs = self.inner.attrs.write();
        if attrs.contains_key(name) {
            return Err(ScriptError::module_init(format!(
                "module '{}' already defines '{name}'",
                self.name()
            )));
        }
        attrs.insert(name.to_string(), value);
        Ok(())
    }

    pub fn add_function(&self, function: BuiltinFunction) -> Result<(), ScriptError> {
        let name = function.name().to_string();
        self.add_object(&name, Object::Function(function))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        self.inner.attrs.read().get(name).cloned()
    }

    /// Sorted attribute names.
    pub fn attribute_names(&self) -> Vec<String> {
        self.inner.attrs.read().keys().cloned().collect()
    }

    /// Sorted names of the callable attributes.
    pub fn function_names(&self) -> Vec<String> {
        self.inner
            .attrs
            .read()
            .iter()
            .filter(|(_, value)| matches!(value, Object::Function(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for ModuleHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<module '{}'>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::{BuiltinFunction, ModuleHandle};
    use crate::interp::error::{ExceptionKind, ScriptError};
    use crate::interp::lock::CallContext;
    use crate::interp::object::Object;
    use std::sync::Arc;
    use uuid::Uuid;

    fn noop(name: &str) -> BuiltinFunction {
        BuiltinFunction::new(
            name,
            "",
            Arc::new(|_ctx: &mut CallContext<'_, '_>, _args: &[Object]| {
                Ok::<_, ScriptError>(Object::None)
            }),
        )
    }

    #[test]
    fn rejects_duplicate_attributes() {
        let module = ModuleHandle::new("kubeutil", "", Uuid::new_v4());
        module.add_function(noop("get_connection_info")).expect("first bind");
        let err = module
            .add_function(noop("get_connection_info"))
            .expect_err("duplicate bind must fail");
        assert!(err.is(ExceptionKind::ModuleInitFailure));
    }

    #[test]
    fn lists_functions_separately_from_constants() {
        let module = ModuleHandle::new("tagger", "", Uuid::new_v4());
        module.add_function(noop("tag")).expect("tag");
        module.add_object("LOW", Object::Int(0)).expect("constant");
        assert_eq!(module.function_names(), vec!["tag".to_string()]);
        assert_eq!(
            module.attribute_names(),
            vec!["LOW".to_string(), "tag".to_string()]
        );
    }
}
