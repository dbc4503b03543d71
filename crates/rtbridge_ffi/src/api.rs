//! C API for host processes.
//!
//! # Responsibility
//! - Expose callback registration, interpreter lifecycle and the active
//!   generation's module initializer to C hosts.
//! - Keep the legacy per-capability setters working on top of the generic
//!   registry.
//!
//! # Invariants
//! - Exported functions never unwind across the boundary; a panic becomes
//!   `RT_ERR_PANIC` (or a null pointer).
//! - Strings returned to the host are allocated here and must be released
//!   with `rtbridge_string_free`.
//! - One callback registry serves the whole process.

use crate::native::{
    take_host_string, take_host_string_array, HostCallback, RtCallbackFn, RtFreeFn,
};
use log::{info, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rtbridge_core::{
    core_version as core_version_inner, from_native, init_logging as init_logging_inner,
    to_native, CallbackError, CallbackOptions, CallbackRegistry, Interpreter, InterpreterConfig,
    Object, RegistryError, ScriptError, Signature, Value, ValueTag,
    ACTIVE_GENERATION, CAPABILITY_CONNECTION_INFO, CAPABILITY_TAGS,
};
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub const RT_OK: i32 = 0;
pub const RT_ERR_NULL_ARGUMENT: i32 = -1;
pub const RT_ERR_INVALID_UTF8: i32 = -2;
pub const RT_ERR_INVALID_CAPABILITY: i32 = -3;
pub const RT_ERR_INVALID_SIGNATURE: i32 = -4;
pub const RT_ERR_SCRIPT: i32 = -5;
pub const RT_ERR_INVALID_JSON: i32 = -6;
pub const RT_ERR_PANIC: i32 = -7;

/// Registration flag: release the execution lock while the callback runs.
pub const RT_FLAG_RELEASES_LOCK: u32 = 1;

static REGISTRY: Lazy<Arc<CallbackRegistry>> = Lazy::new(|| Arc::new(CallbackRegistry::new()));
static LEGACY_FREE: Lazy<RwLock<Option<RtFreeFn>>> = Lazy::new(|| RwLock::new(None));
static VERSION: Lazy<CString> = Lazy::new(|| {
    CString::new(core_version_inner()).unwrap_or_else(|_| CString::default())
});

/// Legacy connection-info callback: writes a JSON document to `*out`.
pub type RtConnectionInfoFn = unsafe extern "C" fn(out: *mut *mut c_char);
/// Legacy tags callback: returns a NULL-terminated array of tags.
pub type RtTagsFn = unsafe extern "C" fn(entity: *const c_char, cardinality: i32) -> *mut *mut c_char;

/// Opaque interpreter handle owned by the host.
pub struct RtInterpreter {
    inner: Interpreter,
}

/// Module handle returned by `rtbridge_module_init`.
#[cfg(feature = "generation-a")]
pub struct RtModule {
    handle: rtbridge_core::ModuleHandle,
}

/// Process-wide registry shared by every interpreter created through this API.
pub fn registry() -> Arc<CallbackRegistry> {
    REGISTRY.clone()
}

fn guarded<T>(fallback: T, body: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            warn!("event=ffi_call module=ffi status=error error_code=panic");
            fallback
        }
    }
}

/// Reads a required UTF-8 argument.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn read_str<'a>(ptr: *const c_char) -> Result<&'a str, i32> {
    if ptr.is_null() {
        return Err(RT_ERR_NULL_ARGUMENT);
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| RT_ERR_INVALID_UTF8)
}

fn into_c_string(text: String) -> *mut c_char {
    let sanitized = text.replace('\0', " ");
    CString::new(sanitized)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

fn registry_status(err: &RegistryError) -> i32 {
    match err {
        RegistryError::InvalidCapabilityName(_) | RegistryError::CapabilityNotRegistered(_) => {
            RT_ERR_INVALID_CAPABILITY
        }
    }
}

/// Registers (or replaces) a host callback for `capability`.
///
/// `signature` uses the textual form `(str, int) -> list`. A null `callback`
/// unregisters the capability instead.
///
/// # FFI contract
/// - Safe to call from any thread, before or after modules are imported.
/// - Returns `RT_OK` or a negative `RT_ERR_*` status.
///
/// # Safety
/// `capability` and `signature` must be valid NUL-terminated strings.
/// `callback`, `free_cb` and `user_data` must stay valid until the capability
/// is replaced or unregistered.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_register_callback(
    capability: *const c_char,
    signature: *const c_char,
    callback: Option<RtCallbackFn>,
    free_cb: Option<RtFreeFn>,
    user_data: *mut c_void,
    flags: u32,
) -> i32 {
    guarded(RT_ERR_PANIC, || {
        let capability = match read_str(capability) {
            Ok(capability) => capability,
            Err(status) => return status,
        };
        let Some(callback) = callback else {
            REGISTRY.unregister(capability);
            return RT_OK;
        };
        let signature = match read_str(signature).map(Signature::parse) {
            Ok(Ok(signature)) => signature,
            Ok(Err(err)) => {
                warn!(
                    "event=callback_register module=ffi status=error capability={} error_code=invalid_signature error={}",
                    capability, err
                );
                return RT_ERR_INVALID_SIGNATURE;
            }
            Err(status) => return status,
        };
        let options = CallbackOptions {
            releases_execution_lock: flags & RT_FLAG_RELEASES_LOCK != 0,
        };
        let host = HostCallback::new(callback, free_cb, user_data);
        match REGISTRY.register_with_options(capability, signature, options, move |args: &[Value]| {
            host.invoke(args)
        }) {
            Ok(_) => RT_OK,
            Err(err) => registry_status(&err),
        }
    })
}

/// Removes the callback for `capability`.
///
/// Returns 1 when a callback was removed, 0 when none was registered, or a
/// negative status.
///
/// # Safety
/// `capability` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_unregister_callback(capability: *const c_char) -> i32 {
    guarded(RT_ERR_PANIC, || match read_str(capability) {
        Ok(capability) => i32::from(REGISTRY.unregister(capability)),
        Err(status) => status,
    })
}

/// Sets the free function used to release buffers returned by the legacy
/// callbacks.
#[no_mangle]
pub extern "C" fn rtbridge_set_free_cb(free_cb: Option<RtFreeFn>) {
    *LEGACY_FREE.write() = free_cb;
}

fn legacy_free() -> Option<RtFreeFn> {
    *LEGACY_FREE.read()
}

/// Installs the legacy `connection-info` callback. NULL unregisters it.
#[no_mangle]
pub extern "C" fn rtbridge_set_get_connection_info_cb(callback: Option<RtConnectionInfoFn>) -> i32 {
    guarded(RT_ERR_PANIC, || {
        let Some(callback) = callback else {
            REGISTRY.unregister(CAPABILITY_CONNECTION_INFO);
            return RT_OK;
        };
        let registered = REGISTRY.register(
            CAPABILITY_CONNECTION_INFO,
            Signature::nullary(ValueTag::Map),
            move |_args: &[Value]| {
                let mut document: *mut c_char = std::ptr::null_mut();
                // SAFETY: the host callback writes an owned string or NULL.
                let text = unsafe {
                    callback(&mut document);
                    take_host_string(document, legacy_free())?
                };
                match text {
                    Some(text) => Value::from_json_str(&text)
                        .map_err(|err| CallbackError::new(err.to_string())),
                    None => Ok(Value::Null),
                }
            },
        );
        match registered {
            Ok(_) => RT_OK,
            Err(err) => registry_status(&err),
        }
    })
}

/// Installs the legacy `tags` callback. NULL unregisters it.
#[no_mangle]
pub extern "C" fn rtbridge_set_tags_cb(callback: Option<RtTagsFn>) -> i32 {
    guarded(RT_ERR_PANIC, || {
        let Some(callback) = callback else {
            REGISTRY.unregister(CAPABILITY_TAGS);
            return RT_OK;
        };
        let registered = REGISTRY.register(
            CAPABILITY_TAGS,
            Signature::new(vec![ValueTag::Str, ValueTag::Int], ValueTag::List),
            move |args: &[Value]| {
                let [Value::Str(entity), Value::Int(cardinality)] = args else {
                    return Err(CallbackError::new("tags expects (str, int)"));
                };
                let entity = CString::new(entity.as_str())
                    .map_err(|_| CallbackError::new("entity contains a NUL byte"))?;
                let cardinality = i32::try_from(*cardinality)
                    .map_err(|_| CallbackError::new("cardinality out of range"))?;
                // SAFETY: the host returns a NULL-terminated array or NULL.
                let tags = unsafe {
                    take_host_string_array(callback(entity.as_ptr(), cardinality), legacy_free())?
                };
                Ok(match tags {
                    Some(tags) => Value::List(tags.into_iter().map(Value::Str).collect()),
                    None => Value::Null,
                })
            },
        );
        match registered {
            Ok(_) => RT_OK,
            Err(err) => registry_status(&err),
        }
    })
}

/// Creates an interpreter with the builtin modules in its init table.
///
/// Module table limits come from `RTBRIDGE_MAX_MODULES` when set.
/// Returns NULL on failure. Release with `rtbridge_interpreter_free`.
#[no_mangle]
pub extern "C" fn rtbridge_interpreter_new() -> *mut RtInterpreter {
    guarded(std::ptr::null_mut(), || {
        let config = InterpreterConfig::from_env().unwrap_or_else(|err| {
            warn!(
                "event=interp_init module=ffi status=error error_code=invalid_config error={}",
                err
            );
            InterpreterConfig::default()
        });
        let inner = Interpreter::with_builtins(registry(), config);
        Box::into_raw(Box::new(RtInterpreter { inner }))
    })
}

/// Finalizes and frees an interpreter. NULL is ignored.
///
/// Finalization clears the process-wide callback registry.
///
/// # Safety
/// `interp` must be null or a pointer from `rtbridge_interpreter_new` that
/// has not been freed.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_interpreter_free(interp: *mut RtInterpreter) {
    if interp.is_null() {
        return;
    }
    guarded((), || drop(Box::from_raw(interp)));
}

/// Imports `name` and returns its module, or NULL with the interpreter's
/// error indicator set.
///
/// # Safety
/// `interp` must be a live interpreter handle; `name` a valid C string.
#[cfg(feature = "generation-a")]
#[no_mangle]
pub unsafe extern "C" fn rtbridge_module_init(
    interp: *mut RtInterpreter,
    name: *const c_char,
) -> *mut RtModule {
    let Some(interp) = interp.as_mut() else {
        return std::ptr::null_mut();
    };
    guarded(std::ptr::null_mut(), || {
        let name = match read_str(name) {
            Ok(name) => name,
            Err(_) => {
                interp
                    .inner
                    .set_error(ScriptError::type_error("module name must be UTF-8 text"));
                return std::ptr::null_mut();
            }
        };
        match interp.inner.import(name) {
            Ok(handle) => Box::into_raw(Box::new(RtModule { handle })),
            Err(err) => {
                interp.inner.set_error(err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Releases a module reference. The module stays installed in its
/// interpreter until finalization.
///
/// # Safety
/// `module` must be null or a pointer from `rtbridge_module_init`.
#[cfg(feature = "generation-a")]
#[no_mangle]
pub unsafe extern "C" fn rtbridge_module_release(module: *mut RtModule) {
    if module.is_null() {
        return;
    }
    guarded((), || drop(Box::from_raw(module)));
}

/// Returns the module's name; release with `rtbridge_string_free`.
///
/// # Safety
/// `module` must be null or a live pointer from `rtbridge_module_init`.
#[cfg(feature = "generation-a")]
#[no_mangle]
pub unsafe extern "C" fn rtbridge_module_name(module: *const RtModule) -> *mut c_char {
    match module.as_ref() {
        Some(module) => into_c_string(module.handle.name().to_string()),
        None => std::ptr::null_mut(),
    }
}

/// Imports `name`; failure is reported only through the error indicator.
///
/// # Safety
/// `interp` must be a live interpreter handle; `name` a valid C string.
#[cfg(feature = "generation-b")]
#[no_mangle]
pub unsafe extern "C" fn rtbridge_init_module(interp: *mut RtInterpreter, name: *const c_char) {
    let Some(interp) = interp.as_mut() else {
        return;
    };
    guarded((), || {
        let name = match read_str(name) {
            Ok(name) => name,
            Err(_) => {
                interp
                    .inner
                    .set_error(ScriptError::type_error("module name must be UTF-8 text"));
                return;
            }
        };
        if let Err(err) = interp.inner.import(name) {
            interp.inner.set_error(err);
        }
    })
}

/// Returns 1 when the interpreter's error indicator is set.
///
/// # Safety
/// `interp` must be null or a live interpreter handle.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_err_occurred(interp: *const RtInterpreter) -> i32 {
    interp
        .as_ref()
        .map(|interp| i32::from(interp.inner.err_occurred()))
        .unwrap_or(0)
}

/// Clears the error indicator and returns it as `Name: message`, or NULL.
///
/// # Safety
/// `interp` must be null or a live interpreter handle.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_take_error(interp: *mut RtInterpreter) -> *mut c_char {
    let Some(interp) = interp.as_mut() else {
        return std::ptr::null_mut();
    };
    match interp.inner.take_error() {
        Some(err) => into_c_string(err.to_string()),
        None => std::ptr::null_mut(),
    }
}

/// Calls `module.function(*args)` with arguments given as a JSON array.
///
/// On `RT_OK`, `*out` receives the JSON result. On `RT_ERR_SCRIPT`, `*out`
/// receives `Name: message`. Release `*out` with `rtbridge_string_free`.
///
/// # Safety
/// `interp` must be a live interpreter handle, the strings valid C strings
/// (`args_json` may be NULL for no arguments), and `out` a writable slot.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_call_json(
    interp: *mut RtInterpreter,
    module: *const c_char,
    function: *const c_char,
    args_json: *const c_char,
    out: *mut *mut c_char,
) -> i32 {
    let Some(interp) = interp.as_mut() else {
        return RT_ERR_NULL_ARGUMENT;
    };
    if out.is_null() {
        return RT_ERR_NULL_ARGUMENT;
    }
    *out = std::ptr::null_mut();
    guarded(RT_ERR_PANIC, || {
        let (module, function) = match (read_str(module), read_str(function)) {
            (Ok(module), Ok(function)) => (module, function),
            (Err(status), _) | (_, Err(status)) => return status,
        };
        let args = if args_json.is_null() {
            Vec::new()
        } else {
            let text = match read_str(args_json) {
                Ok(text) => text,
                Err(status) => return status,
            };
            match Value::from_json_str(text) {
                Ok(Value::List(items)) => items.iter().map(to_native).collect::<Vec<Object>>(),
                Ok(_) | Err(_) => return RT_ERR_INVALID_JSON,
            }
        };

        let outcome = interp
            .inner
            .call(module, function, &args)
            .and_then(|result| from_native(&result).map_err(ScriptError::from))
            .and_then(|value| value.to_json().map_err(ScriptError::from));
        match outcome {
            Ok(json) => {
                *out = into_c_string(json.to_string());
                RT_OK
            }
            Err(err) => {
                *out = into_c_string(err.to_string());
                RT_ERR_SCRIPT
            }
        }
    })
}

/// Frees a string returned by this library. NULL is ignored.
///
/// # Safety
/// `ptr` must be null or a string returned by this library, freed once.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Generation compiled into this library: 1 for A, 2 for B.
#[no_mangle]
pub extern "C" fn rtbridge_generation() -> u32 {
    ACTIVE_GENERATION.code()
}

/// Library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn rtbridge_version() -> *const c_char {
    VERSION.as_ptr()
}

/// Clears every registered callback and the legacy free function.
///
/// Returns the number of callbacks removed.
#[no_mangle]
pub extern "C" fn rtbridge_shutdown() -> usize {
    guarded(0, || {
        let removed = REGISTRY.clear();
        *LEGACY_FREE.write() = None;
        info!(
            "event=bridge_shutdown module=ffi status=ok callbacks={}",
            removed
        );
        removed
    })
}

/// Initializes file logging once per process.
///
/// Returns NULL on success, or an error message to release with
/// `rtbridge_string_free`.
///
/// # Safety
/// `level` and `log_dir` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn rtbridge_init_logging(
    level: *const c_char,
    log_dir: *const c_char,
) -> *mut c_char {
    guarded(std::ptr::null_mut(), || {
        let (level, log_dir) = match (read_str(level), read_str(log_dir)) {
            (Ok(level), Ok(log_dir)) => (level, log_dir),
            _ => return into_c_string("level and log_dir must be UTF-8 strings".to_string()),
        };
        match init_logging_inner(level, log_dir) {
            Ok(()) => std::ptr::null_mut(),
            Err(err) => into_c_string(err),
        }
    })
}
