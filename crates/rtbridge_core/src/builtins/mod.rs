//! Builtin modules installed in every interpreter's init table.

pub mod kubeutil;
pub mod tagger;

use crate::abi::InitFn;

/// `(module name, initializer)` pairs for the builtin modules.
pub fn default_inittab() -> Vec<(&'static str, InitFn)> {
    vec![
        (kubeutil::MODULE_NAME, kubeutil::init_kubeutil as InitFn),
        (tagger::MODULE_NAME, tagger::init_tagger as InitFn),
    ]
}
