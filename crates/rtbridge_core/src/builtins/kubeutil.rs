//! `kubeutil` builtin module.
//!
//! Exposes `get_connection_info()`, backed by the `connection-info`
//! capability with signature `() -> map`.

#[cfg(feature = "generation-a")]
use crate::abi::generation_a;
#[cfg(feature = "generation-b")]
use crate::abi::generation_b;
use crate::abi::ModuleDef;
use crate::adapter::CapabilityAdapter;
use crate::interp::error::ScriptError;
use crate::interp::object::Object;
use crate::interp::Interpreter;
use crate::model::capability::{CapabilityName, CAPABILITY_CONNECTION_INFO};
use crate::registry::CallbackRegistry;
use std::sync::Arc;

#[cfg(feature = "generation-a")]
use crate::interp::module::ModuleHandle;

pub const MODULE_NAME: &str = "kubeutil";

const MODULE_DOC: &str = "Cluster connection details supplied by the host.";
const GET_CONNECTION_INFO_DOC: &str = "get_connection_info() -> dict\n\n\
    Returns the host's connection details, or {} when none are known.";

/// Describes the module bound against `registry`.
pub fn module_def(registry: &Arc<CallbackRegistry>) -> Result<ModuleDef, ScriptError> {
    let capability = CapabilityName::parse(CAPABILITY_CONNECTION_INFO)
        .map_err(|err| ScriptError::module_init(err.to_string()))?;
    let adapter = CapabilityAdapter::new(capability, registry.clone())
        .with_result_transform(|result| match result {
            Object::None => Object::Dict(Vec::new()),
            other => other,
        });
    Ok(ModuleDef::new(MODULE_NAME, MODULE_DOC).method(
        "get_connection_info",
        GET_CONNECTION_INFO_DOC,
        adapter,
    ))
}

#[cfg(feature = "generation-a")]
pub fn init_kubeutil(interp: &mut Interpreter) -> Option<ModuleHandle> {
    match module_def(interp.registry()) {
        Ok(def) => generation_a::module_create(interp, &def),
        Err(err) => {
            interp.set_error(err);
            None
        }
    }
}

#[cfg(feature = "generation-b")]
pub fn init_kubeutil(interp: &mut Interpreter) {
    match module_def(interp.registry()) {
        Ok(def) => generation_b::install(interp, &def),
        Err(err) => interp.set_error(err),
    }
}
