//! Capability-to-callback registry.

pub mod callback_registry;

pub use callback_registry::{
    CallbackEntry, CallbackError, CallbackOptions, CallbackRegistry, NativeFn, RegistryError,
};
