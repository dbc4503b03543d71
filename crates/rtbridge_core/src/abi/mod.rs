//! Build-time interpreter generation dispatch.
//!
//! # Responsibility
//! - Describe builtin modules once (`ModuleDef`) and let the active
//!   generation turn that description into an installed module.
//! - Expose the import protocol each generation expects from an initializer.
//!
//! # Invariants
//! - Exactly one of the `generation-a` / `generation-b` features is enabled;
//!   the other generation's module is not compiled at all.
//! - Both generations bind the same `CapabilityAdapter`, so behavior visible
//!   to scripts does not depend on the generation.
//!
//! # See also
//! - `crate::builtins` for the modules described here.

#[cfg(all(feature = "generation-a", feature = "generation-b"))]
compile_error!("features `generation-a` and `generation-b` are mutually exclusive");

#[cfg(not(any(feature = "generation-a", feature = "generation-b")))]
compile_error!("enable exactly one of the `generation-a` or `generation-b` features");

#[cfg(feature = "generation-a")]
pub mod generation_a;
#[cfg(feature = "generation-b")]
pub mod generation_b;

use crate::adapter::CapabilityAdapter;
use crate::interp::error::ScriptError;
use crate::interp::module::{BuiltinFunction, ModuleHandle};
use crate::interp::Interpreter;
use std::fmt::{Display, Formatter};

/// Interpreter generation a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterpreterGeneration {
    GenerationA,
    GenerationB,
}

impl InterpreterGeneration {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerationA => "generation-a",
            Self::GenerationB => "generation-b",
        }
    }

    /// Numeric code exposed through the C API.
    pub fn code(self) -> u32 {
        match self {
            Self::GenerationA => 1,
            Self::GenerationB => 2,
        }
    }
}

impl Display for InterpreterGeneration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter-construction and import protocol of one generation.
pub trait GenerationAbi {
    const GENERATION: InterpreterGeneration;

    /// Module initializer shape stored in the init table.
    type InitFn: Copy + Send + Sync + 'static;

    /// Wraps `adapter` in the generation's method calling convention.
    fn bind_adapter(method: &MethodDef) -> BuiltinFunction;

    /// Runs `init` for module `name` and returns the installed module.
    fn run_initializer(
        interp: &mut Interpreter,
        name: &str,
        init: Self::InitFn,
    ) -> Result<ModuleHandle, ScriptError>;
}

#[cfg(feature = "generation-a")]
pub use generation_a::GenerationA as ActiveAbi;
#[cfg(feature = "generation-b")]
pub use generation_b::GenerationB as ActiveAbi;

/// Generation compiled into this build.
pub const ACTIVE_GENERATION: InterpreterGeneration = <ActiveAbi as GenerationAbi>::GENERATION;

/// Initializer shape of the active generation.
pub type InitFn = <ActiveAbi as GenerationAbi>::InitFn;

/// One module-level callable backed by a capability.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: &'static str,
    pub doc: &'static str,
    pub adapter: CapabilityAdapter,
}

/// Generation-neutral description of a builtin module.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub name: &'static str,
    pub doc: &'static str,
    pub methods: Vec<MethodDef>,
    pub int_constants: Vec<(&'static str, i64)>,
}

impl ModuleDef {
    pub fn new(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            methods: Vec::new(),
            int_constants: Vec::new(),
        }
    }

    pub fn method(
        mut self,
        name: &'static str,
        doc: &'static str,
        adapter: CapabilityAdapter,
    ) -> Self {
        self.methods.push(MethodDef { name, doc, adapter });
        self
    }

    pub fn int_constant(mut self, name: &'static str, value: i64) -> Self {
        self.int_constants.push((name, value));
        self
    }
}
