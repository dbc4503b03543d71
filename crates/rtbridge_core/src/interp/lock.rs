//! Interpreter execution lock.
//!
//! # Responsibility
//! - Serialize script execution: one thread runs interpreter code at a time.
//! - Let native callbacks release the lock around blocking work.
//!
//! # Invariants
//! - The execution lock is independent from the callback registry lock;
//!   neither is ever acquired while holding the other.

use crate::abi::InterpreterGeneration;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Shared handle to one interpreter's execution lock.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLock {
    inner: Arc<Mutex<()>>,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is held.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }

    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock()
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Per-call state handed to builtin functions while the lock is held.
pub struct CallContext<'g, 'l> {
    guard: &'g mut MutexGuard<'l, ()>,
    generation: InterpreterGeneration,
}

impl<'g, 'l> CallContext<'g, 'l> {
    pub fn new(guard: &'g mut MutexGuard<'l, ()>, generation: InterpreterGeneration) -> Self {
        Self { guard, generation }
    }

    pub fn generation(&self) -> InterpreterGeneration {
        self.generation
    }

    /// Runs `f` with the execution lock released, reacquiring it afterwards.
    pub fn allow_threads<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        MutexGuard::unlocked(self.guard, f)
    }
}
