//! C ABI surface of the runtime bridge.
//!
//! `api` holds the exported `rtbridge_*` functions; `native` adapts host
//! function pointers to registry callbacks.

pub mod api;
pub mod native;

pub use api::registry;
