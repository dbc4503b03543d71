//! `tagger` builtin module.
//!
//! # Responsibility
//! - Expose entity tag lookups (`tag`, `get_tags`) backed by the `tags`
//!   capability with signature `(str, int) -> list`.
//! - Publish the cardinality constants `LOW`, `ORCHESTRATOR` and `HIGH`.
//!
//! # Invariants
//! - The host callback only ever sees a cardinality in `LOW..=HIGH`.
//! - An entity the host knows nothing about yields `[]`, never `None`.

#[cfg(feature = "generation-a")]
use crate::abi::generation_a;
#[cfg(feature = "generation-b")]
use crate::abi::generation_b;
use crate::abi::ModuleDef;
use crate::adapter::CapabilityAdapter;
use crate::interp::error::{ExceptionKind, ScriptError};
use crate::interp::object::Object;
use crate::interp::Interpreter;
use crate::model::capability::{CapabilityName, CAPABILITY_TAGS};
use crate::registry::CallbackRegistry;
use std::sync::Arc;

#[cfg(feature = "generation-a")]
use crate::interp::module::ModuleHandle;

pub const MODULE_NAME: &str = "tagger";

pub const LOW: i64 = 0;
pub const ORCHESTRATOR: i64 = 1;
pub const HIGH: i64 = 2;

const MODULE_DOC: &str = "Entity tags supplied by the host tagger.";
const TAG_DOC: &str = "tag(entity, cardinality) -> list\n\n\
    Returns the tags of `entity` at the given cardinality.";
const GET_TAGS_DOC: &str = "get_tags(entity, high_card) -> list\n\n\
    Returns HIGH cardinality tags when `high_card` is true, LOW otherwise.";

/// Describes the module bound against `registry`.
pub fn module_def(registry: &Arc<CallbackRegistry>) -> Result<ModuleDef, ScriptError> {
    let capability = CapabilityName::parse(CAPABILITY_TAGS)
        .map_err(|err| ScriptError::module_init(err.to_string()))?;
    let base = CapabilityAdapter::new(capability, registry.clone())
        .with_result_transform(empty_list_for_none);

    Ok(ModuleDef::new(MODULE_NAME, MODULE_DOC)
        .method(
            "tag",
            TAG_DOC,
            base.clone().with_transform(check_cardinality),
        )
        .method(
            "get_tags",
            GET_TAGS_DOC,
            base.with_transform(high_card_to_cardinality),
        )
        .int_constant("LOW", LOW)
        .int_constant("ORCHESTRATOR", ORCHESTRATOR)
        .int_constant("HIGH", HIGH))
}

fn empty_list_for_none(result: Object) -> Object {
    match result {
        Object::None => Object::List(Vec::new()),
        other => other,
    }
}

/// Bools count as ints (`True` is `1`); other types are left for the
/// signature check to reject.
fn check_cardinality(args: &[Object]) -> Result<Vec<Object>, ScriptError> {
    let [entity, cardinality] = args else {
        return Ok(args.to_vec());
    };
    let cardinality = match cardinality {
        Object::Bool(flag) => i64::from(*flag),
        Object::Int(value) => *value,
        _ => return Ok(args.to_vec()),
    };
    if !(LOW..=HIGH).contains(&cardinality) {
        return Err(ScriptError::type_error("Invalid cardinality"));
    }
    Ok(vec![entity.clone(), Object::Int(cardinality)])
}

fn high_card_to_cardinality(args: &[Object]) -> Result<Vec<Object>, ScriptError> {
    let [entity, flag] = args else {
        return Ok(args.to_vec());
    };
    let high = match flag {
        Object::Bool(_) | Object::Int(_) => flag.is_truthy(),
        other => {
            return Err(ScriptError::new(
                ExceptionKind::ArgumentMismatch,
                format!("argument 2 must be bool, not {}", other.type_name()),
            ))
        }
    };
    let cardinality = if high { HIGH } else { LOW };
    Ok(vec![entity.clone(), Object::Int(cardinality)])
}

#[cfg(feature = "generation-a")]
pub fn init_tagger(interp: &mut Interpreter) -> Option<ModuleHandle> {
    match module_def(interp.registry()) {
        Ok(def) => generation_a::module_create(interp, &def),
        Err(err) => {
            interp.set_error(err);
            None
        }
    }
}

#[cfg(feature = "generation-b")]
pub fn init_tagger(interp: &mut Interpreter) {
    match module_def(interp.registry()) {
        Ok(def) => generation_b::install(interp, &def),
        Err(err) => interp.set_error(err),
    }
}
