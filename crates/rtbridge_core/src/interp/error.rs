//! Interpreter-visible exceptions.
//!
//! # Responsibility
//! - Carry every bridge failure to interpreter code as a catchable error.
//! - Keep exception names stable so scripts can match on them.
//!
//! # Invariants
//! - Misuse of the bridge never terminates the process; it becomes a
//!   `ScriptError`.

use crate::marshal::MarshalError;
use crate::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable exception kinds raised into interpreter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// No native callback is installed for the requested capability.
    CapabilityNotRegistered,
    /// Call arguments do not match the registered signature.
    ArgumentMismatch,
    /// A value cannot be represented in the boundary shape.
    MarshalingFailure,
    /// Module creation or registration failed at import time.
    ModuleInitFailure,
    /// The native callback reported failure or panicked.
    CallbackFailure,
    TypeError,
    ImportError,
    AttributeError,
}

impl ExceptionKind {
    /// Stable name exposed to scripts.
    pub fn name(self) -> &'static str {
        match self {
            Self::CapabilityNotRegistered => "CapabilityNotRegistered",
            Self::ArgumentMismatch => "ArgumentMismatch",
            Self::MarshalingFailure => "MarshalingFailure",
            Self::ModuleInitFailure => "ModuleInitFailure",
            Self::CallbackFailure => "CallbackFailure",
            Self::TypeError => "TypeError",
            Self::ImportError => "ImportError",
            Self::AttributeError => "AttributeError",
        }
    }
}

impl Display for ExceptionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Exception raised into interpreter code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub kind: ExceptionKind,
    pub message: String,
    /// Capability involved in the failure, when there is one.
    pub capability: Option<String>,
}

impl ScriptError {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            capability: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn module_init(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ModuleInitFailure, message)
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn is(&self, kind: ExceptionKind) -> bool {
        self.kind == kind
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

impl Error for ScriptError {}

impl From<RegistryError> for ScriptError {
    fn from(value: RegistryError) -> Self {
        match &value {
            RegistryError::CapabilityNotRegistered(name) => {
                Self::new(ExceptionKind::CapabilityNotRegistered, value.to_string())
                    .with_capability(name.clone())
            }
            RegistryError::InvalidCapabilityName(_) => {
                Self::new(ExceptionKind::CapabilityNotRegistered, value.to_string())
            }
        }
    }
}

impl From<MarshalError> for ScriptError {
    fn from(value: MarshalError) -> Self {
        let kind = if value.is_argument_mismatch() {
            ExceptionKind::ArgumentMismatch
        } else {
            ExceptionKind::MarshalingFailure
        };
        Self::new(kind, value.to_string())
    }
}
