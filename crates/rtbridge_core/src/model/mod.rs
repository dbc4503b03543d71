//! Boundary data model.
//!
//! # Responsibility
//! - Define capability identifiers, boundary values and callback signatures.
//!
//! # Invariants
//! - Model types are plain data; they never reference interpreter state.

pub mod capability;
pub mod signature;
pub mod value;
