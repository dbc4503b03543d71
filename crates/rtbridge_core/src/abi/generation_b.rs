//! Generation B module protocol.
//!
//! Initializers return nothing: `init_module` registers the module in the
//! interpreter as a side effect, constants are attached afterwards with
//! `add_int_constant`, and failure is visible only through the error
//! indicator. Methods receive their arguments packed into one tuple.

use super::{GenerationAbi, InterpreterGeneration, MethodDef, ModuleDef};
use crate::adapter::CapabilityAdapter;
use crate::interp::error::ScriptError;
use crate::interp::lock::CallContext;
use crate::interp::module::{BuiltinFunction, ModuleHandle};
use crate::interp::object::Object;
use crate::interp::Interpreter;
use log::warn;
use std::sync::Arc;

pub struct GenerationB;

impl GenerationAbi for GenerationB {
    const GENERATION: InterpreterGeneration = InterpreterGeneration::GenerationB;

    type InitFn = fn(&mut Interpreter);

    fn bind_adapter(method: &MethodDef) -> BuiltinFunction {
        let adapter = method.adapter.clone();
        BuiltinFunction::new(
            method.name,
            method.doc,
            Arc::new(move |ctx: &mut CallContext<'_, '_>, args: &[Object]| {
                let packed = Object::Tuple(args.to_vec());
                varargs(&adapter, ctx, &packed)
            }),
        )
    }

    fn run_initializer(
        interp: &mut Interpreter,
        name: &str,
        init: Self::InitFn,
    ) -> Result<ModuleHandle, ScriptError> {
        let before = interp.module_names();
        init(interp);
        let added: Vec<String> = interp
            .module_names()
            .into_iter()
            .filter(|module_name| !before.contains(module_name))
            .collect();

        if let Some(err) = interp.take_error() {
            discard_modules(interp, name, &added);
            return Err(err);
        }
        if let Some(module) = interp.module(name) {
            return Ok(module);
        }
        // An init-table alias: the module registered itself under its own
        // name. Rebind it under the import name, as generation A does.
        if let [own_name] = added.as_slice() {
            if let Some(module) = interp.remove_module(own_name) {
                interp.register_module(name, module.clone())?;
                return Ok(module);
            }
        }
        discard_modules(interp, name, &added);
        Err(ScriptError::module_init(format!(
            "initialization of {name} did not register a module"
        )))
    }
}

/// Removes modules a failed initializer left behind.
fn discard_modules(interp: &mut Interpreter, name: &str, added: &[String]) {
    for module_name in added {
        if interp.remove_module(module_name).is_some() {
            warn!(
                "event=module_init module=abi status=error module_name={} action=remove_partial removed={}",
                name, module_name
            );
        }
    }
}

fn varargs(
    adapter: &CapabilityAdapter,
    ctx: &mut CallContext<'_, '_>,
    packed: &Object,
) -> Result<Object, ScriptError> {
    let Object::Tuple(items) = packed else {
        return Err(ScriptError::type_error(format!(
            "argument list must be a tuple, not {}",
            packed.type_name()
        )));
    };
    adapter.invoke(ctx, items)
}

/// Creates module `name`, registers it, then binds `methods`.
///
/// The module stays registered when a later step fails; `run_initializer`
/// removes it after seeing the error indicator.
pub fn init_module(
    interp: &mut Interpreter,
    name: &str,
    methods: &[MethodDef],
    doc: &str,
) -> Option<ModuleHandle> {
    let module = match interp.new_module(name, doc) {
        Ok(module) => module,
        Err(err) => {
            interp.set_error(err);
            return None;
        }
    };
    if let Err(err) = interp.register_module(name, module.clone()) {
        interp.set_error(err);
        return None;
    }
    for method in methods {
        if let Err(err) = module.add_function(GenerationB::bind_adapter(method)) {
            interp.set_error(err);
            return None;
        }
    }
    Some(module)
}

/// Adds an integer constant; failure sets the error indicator.
pub fn add_int_constant(
    interp: &mut Interpreter,
    module: &ModuleHandle,
    name: &str,
    value: i64,
) {
    if let Err(err) = module.add_object(name, Object::Int(value)) {
        interp.set_error(err);
    }
}

/// Installs `def` with `init_module` followed by its constants.
pub fn install(interp: &mut Interpreter, def: &ModuleDef) {
    let Some(module) = init_module(interp, def.name, &def.methods, def.doc) else {
        return;
    };
    for (name, value) in &def.int_constants {
        add_int_constant(interp, &module, name, *value);
        if interp.err_occurred() {
            return;
        }
    }
}
