//! Process-wide callback registry.
//!
//! # Responsibility
//! - Map capability names to the native callback currently installed for
//!   them, together with its declared signature.
//! - Serve lookups from the interpreter thread while host threads register
//!   and unregister concurrently.
//!
//! # Invariants
//! - Last registration wins; there is no stacking.
//! - Entries are immutable and swapped whole, so a lookup observes either the
//!   previous or the next entry, never a mix.
//! - The table lock is never held while a callback runs.
//!
//! # See also
//! - `crate::adapter` for the invocation path.

use crate::model::capability::{CapabilityName, CapabilityNameError};
use crate::model::signature::Signature;
use crate::model::value::Value;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

/// Native host function behind one capability.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync;

/// Failure reported by a native callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackError {
    pub message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for CallbackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for CallbackError {}

/// Per-registration behavior flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackOptions {
    /// Release the interpreter execution lock while the callback runs.
    pub releases_execution_lock: bool,
}

impl CallbackOptions {
    pub fn blocking() -> Self {
        Self {
            releases_execution_lock: true,
        }
    }
}

/// One registered callback snapshot.
pub struct CallbackEntry {
    capability: CapabilityName,
    signature: Signature,
    options: CallbackOptions,
    generation: u64,
    registered_at: SystemTime,
    func: Arc<NativeFn>,
}

impl CallbackEntry {
    pub fn capability(&self) -> &CapabilityName {
        &self.capability
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn options(&self) -> CallbackOptions {
        self.options
    }

    /// Registry-wide registration sequence number.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registered_at(&self) -> SystemTime {
        self.registered_at
    }

    /// Calls the native function directly, without signature checks.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, CallbackError> {
        (self.func)(args)
    }
}

impl Debug for CallbackEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("capability", &self.capability)
            .field("signature", &self.signature)
            .field("options", &self.options)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Registry lookup/registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidCapabilityName(CapabilityNameError),
    CapabilityNotRegistered(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCapabilityName(err) => write!(f, "{err}"),
            Self::CapabilityNotRegistered(name) => {
                write!(f, "no native callback registered for capability '{name}'")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCapabilityName(err) => Some(err),
            Self::CapabilityNotRegistered(_) => None,
        }
    }
}

impl From<CapabilityNameError> for RegistryError {
    fn from(value: CapabilityNameError) -> Self {
        Self::InvalidCapabilityName(value)
    }
}

#[derive(Default)]
struct RegistryTable {
    entries: BTreeMap<CapabilityName, Arc<CallbackEntry>>,
    next_generation: u64,
}

/// Thread-safe capability table.
///
/// Safe to call from inside a native callback: the lock only guards the map
/// swap and is independent of the interpreter execution lock.
#[derive(Default)]
pub struct CallbackRegistry {
    table: Mutex<RegistryTable>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the callback for `capability`.
    ///
    /// Returns the registration generation of the new entry.
    pub fn register<F>(
        &self,
        capability: &str,
        signature: Signature,
        func: F,
    ) -> Result<u64, RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.register_with_options(capability, signature, CallbackOptions::default(), func)
    }

    pub fn register_with_options<F>(
        &self,
        capability: &str,
        signature: Signature,
        options: CallbackOptions,
        func: F,
    ) -> Result<u64, RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.register_arc(capability, signature, options, Arc::new(func))
    }

    /// Registers an already shared native function.
    pub fn register_arc(
        &self,
        capability: &str,
        signature: Signature,
        options: CallbackOptions,
        func: Arc<NativeFn>,
    ) -> Result<u64, RegistryError> {
        let capability = CapabilityName::parse(capability)?;
        let signature_text = signature.to_string();

        let (generation, replaced) = {
            let mut table = self.table.lock();
            table.next_generation += 1;
            let generation = table.next_generation;
            let entry = Arc::new(CallbackEntry {
                capability: capability.clone(),
                signature,
                options,
                generation,
                registered_at: SystemTime::now(),
                func,
            });
            let replaced = table.entries.insert(capability.clone(), entry).is_some();
            (generation, replaced)
        };

        info!(
            "event=callback_register module=registry status=ok capability={} signature=\"{}\" generation={} replaced={} releases_lock={}",
            capability, signature_text, generation, replaced, options.releases_execution_lock
        );
        Ok(generation)
    }

    /// Removes the entry for `capability`; returns whether one existed.
    pub fn unregister(&self, capability: &str) -> bool {
        let removed = self.table.lock().entries.remove(capability.trim()).is_some();
        info!(
            "event=callback_unregister module=registry status=ok capability={} removed={}",
            capability.trim(),
            removed
        );
        removed
    }

    /// Returns the current entry for `capability`.
    pub fn lookup(&self, capability: &str) -> Result<Arc<CallbackEntry>, RegistryError> {
        let name = capability.trim();
        let found = self.table.lock().entries.get(name).cloned();
        match found {
            Some(entry) => Ok(entry),
            None => {
                debug!(
                    "event=callback_lookup module=registry status=error capability={} error_code=not_registered",
                    name
                );
                Err(RegistryError::CapabilityNotRegistered(name.to_string()))
            }
        }
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.table.lock().entries.contains_key(capability.trim())
    }

    /// Sorted registered capability names.
    pub fn capabilities(&self) -> Vec<String> {
        self.table
            .lock()
            .entries
            .keys()
            .map(|name| name.as_str().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().entries.is_empty()
    }

    /// Drops every entry; returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut table = self.table.lock();
            let count = table.entries.len();
            table.entries.clear();
            count
        };
        info!(
            "event=registry_clear module=registry status=ok removed={}",
            removed
        );
        removed
    }
}
