//! Generation A module protocol.
//!
//! Initializers build and return the module object; the import machinery
//! registers it. A `None` return with the error indicator set means failure.
//! Methods receive their arguments as a vector (fastcall convention).

use super::{GenerationAbi, InterpreterGeneration, MethodDef, ModuleDef};
use crate::adapter::CapabilityAdapter;
use crate::interp::error::ScriptError;
use crate::interp::lock::CallContext;
use crate::interp::module::{BuiltinFunction, ModuleHandle};
use crate::interp::object::Object;
use crate::interp::Interpreter;
use std::sync::Arc;

pub struct GenerationA;

impl GenerationAbi for GenerationA {
    const GENERATION: InterpreterGeneration = InterpreterGeneration::GenerationA;

    type InitFn = fn(&mut Interpreter) -> Option<ModuleHandle>;

    fn bind_adapter(method: &MethodDef) -> BuiltinFunction {
        let adapter = method.adapter.clone();
        BuiltinFunction::new(
            method.name,
            method.doc,
            Arc::new(move |ctx: &mut CallContext<'_, '_>, args: &[Object]| {
                fastcall(&adapter, ctx, args, args.len())
            }),
        )
    }

    fn run_initializer(
        interp: &mut Interpreter,
        name: &str,
        init: Self::InitFn,
    ) -> Result<ModuleHandle, ScriptError> {
        match init(interp) {
            Some(module) => {
                if let Some(err) = interp.take_error() {
                    return Err(ScriptError::module_init(format!(
                        "initialization of {name} returned a module with an exception set: {err}"
                    )));
                }
                interp.register_module(name, module.clone())?;
                Ok(module)
            }
            None => Err(interp.take_error().unwrap_or_else(|| {
                ScriptError::module_init(format!(
                    "initialization of {name} failed without raising an exception"
                ))
            })),
        }
    }
}

fn fastcall(
    adapter: &CapabilityAdapter,
    ctx: &mut CallContext<'_, '_>,
    args: &[Object],
    nargs: usize,
) -> Result<Object, ScriptError> {
    adapter.invoke(ctx, &args[..nargs])
}

/// Creates the module described by `def` without registering it.
///
/// Returns `None` and sets the error indicator on failure.
pub fn module_create(interp: &mut Interpreter, def: &ModuleDef) -> Option<ModuleHandle> {
    match build_module(interp, def) {
        Ok(module) => Some(module),
        Err(err) => {
            interp.set_error(err);
            None
        }
    }
}

fn build_module(interp: &mut Interpreter, def: &ModuleDef) -> Result<ModuleHandle, ScriptError> {
    let module = interp.new_module(def.name, def.doc)?;
    for method in &def.methods {
        module.add_function(GenerationA::bind_adapter(method))?;
    }
    for (name, value) in &def.int_constants {
        module.add_object(name, Object::Int(*value))?;
    }
    Ok(module)
}
