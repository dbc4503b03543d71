//! Host callback plumbing behind the C API.
//!
//! # Responsibility
//! - Encode boundary values into `RtValue` argument frames for host callbacks.
//! - Deep-copy host results into owned values and hand the host's buffers
//!   back to its free callback.
//!
//! # Invariants
//! - Argument payloads stay alive until the host callback returns.
//! - A host buffer is released exactly once, after it has been copied.

use rtbridge_core::{CallbackError, Value};
use std::ffi::{c_char, c_void, CStr};
use std::slice;

pub const RT_TAG_NULL: u32 = 0;
pub const RT_TAG_BOOL: u32 = 1;
pub const RT_TAG_INT: u32 = 2;
pub const RT_TAG_FLOAT: u32 = 3;
/// UTF-8 text; `len` excludes the trailing NUL. Results with `len == 0` and
/// non-null `data` are read as NUL-terminated.
pub const RT_TAG_STR: u32 = 4;
pub const RT_TAG_BYTES: u32 = 5;
/// Lists and maps, carried as UTF-8 JSON text.
pub const RT_TAG_JSON: u32 = 6;

/// One value crossing the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtValue {
    pub tag: u32,
    pub int_value: i64,
    pub float_value: f64,
    pub data: *const c_void,
    pub len: usize,
}

impl RtValue {
    pub const fn null() -> Self {
        Self {
            tag: RT_TAG_NULL,
            int_value: 0,
            float_value: 0.0,
            data: std::ptr::null(),
            len: 0,
        }
    }
}

impl Default for RtValue {
    fn default() -> Self {
        Self::null()
    }
}

/// Host callback: fills `out` and returns 0, or returns non-zero on failure
/// (an `RT_TAG_STR` in `out` then carries the error message).
pub type RtCallbackFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    args: *const RtValue,
    nargs: usize,
    out: *mut RtValue,
) -> i32;

/// Releases a buffer the host handed to the bridge.
pub type RtFreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// Opaque host context passed back to every callback invocation.
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The host owns `user_data` and guarantees it may be used from any thread
// that invokes the callback.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Argument frame handed to one host callback call.
struct ArgFrame {
    values: Vec<RtValue>,
    _buffers: Vec<Vec<u8>>,
}

fn encode_args(args: &[Value]) -> Result<ArgFrame, CallbackError> {
    let mut values = Vec::with_capacity(args.len());
    let mut buffers = Vec::new();
    for arg in args {
        let mut value = RtValue::null();
        let payload = match arg {
            Value::Null => None,
            Value::Bool(flag) => {
                value.tag = RT_TAG_BOOL;
                value.int_value = i64::from(*flag);
                None
            }
            Value::Int(int) => {
                value.tag = RT_TAG_INT;
                value.int_value = *int;
                None
            }
            Value::Float(float) => {
                value.tag = RT_TAG_FLOAT;
                value.float_value = *float;
                None
            }
            Value::Str(text) => {
                value.tag = RT_TAG_STR;
                Some((text.as_bytes().to_vec(), text.len()))
            }
            Value::Bytes(bytes) => {
                value.tag = RT_TAG_BYTES;
                Some((bytes.clone(), bytes.len()))
            }
            Value::List(_) | Value::Map(_) => {
                value.tag = RT_TAG_JSON;
                let json = arg
                    .to_json()
                    .map_err(|err| CallbackError::new(err.to_string()))?
                    .to_string();
                let len = json.len();
                Some((json.into_bytes(), len))
            }
        };
        if let Some((mut bytes, len)) = payload {
            bytes.push(0);
            value.data = bytes.as_ptr().cast();
            value.len = len;
            buffers.push(bytes);
        }
        values.push(value);
    }
    Ok(ArgFrame {
        values,
        _buffers: buffers,
    })
}

/// Copies the payload of a host-owned value.
///
/// # Safety
/// `value.data` must be null or valid for `value.len` bytes (or
/// NUL-terminated when `len == 0` and the tag is `RT_TAG_STR`).
unsafe fn payload_bytes(value: &RtValue) -> Vec<u8> {
    if value.data.is_null() {
        return Vec::new();
    }
    if value.len == 0 {
        if value.tag == RT_TAG_STR || value.tag == RT_TAG_JSON {
            return CStr::from_ptr(value.data.cast::<c_char>()).to_bytes().to_vec();
        }
        return Vec::new();
    }
    slice::from_raw_parts(value.data.cast::<u8>(), value.len).to_vec()
}

fn utf8(bytes: Vec<u8>) -> Result<String, CallbackError> {
    String::from_utf8(bytes).map_err(|_| CallbackError::new("host returned non UTF-8 text"))
}

/// Deep-copies a host result into an owned value.
///
/// # Safety
/// Same contract as `payload_bytes`.
unsafe fn decode_value(value: &RtValue) -> Result<Value, CallbackError> {
    match value.tag {
        RT_TAG_NULL => Ok(Value::Null),
        RT_TAG_BOOL => Ok(Value::Bool(value.int_value != 0)),
        RT_TAG_INT => Ok(Value::Int(value.int_value)),
        RT_TAG_FLOAT => Ok(Value::Float(value.float_value)),
        RT_TAG_STR => Ok(Value::Str(utf8(payload_bytes(value))?)),
        RT_TAG_BYTES => Ok(Value::Bytes(payload_bytes(value))),
        RT_TAG_JSON => {
            let text = utf8(payload_bytes(value))?;
            Value::from_json_str(&text).map_err(|err| CallbackError::new(err.to_string()))
        }
        other => Err(CallbackError::new(format!(
            "host returned unknown value tag {other}"
        ))),
    }
}

/// Host function registered through `rtbridge_register_callback`.
#[derive(Clone)]
pub struct HostCallback {
    callback: RtCallbackFn,
    free: Option<RtFreeFn>,
    user_data: UserData,
}

impl HostCallback {
    pub fn new(callback: RtCallbackFn, free: Option<RtFreeFn>, user_data: *mut c_void) -> Self {
        Self {
            callback,
            free,
            user_data: UserData(user_data),
        }
    }

    /// Calls the host and returns an owned copy of its result.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, CallbackError> {
        let frame = encode_args(args)?;
        let mut out = RtValue::null();
        // SAFETY: the frame outlives the call and `out` is a valid slot.
        let status = unsafe {
            (self.callback)(
                self.user_data.0,
                frame.values.as_ptr(),
                frame.values.len(),
                &mut out,
            )
        };
        // SAFETY: the host contract says `out` describes a readable buffer.
        let decoded = unsafe { decode_value(&out) };
        release(self.free, out.data.cast_mut());

        if status != 0 {
            let message = match decoded {
                Ok(Value::Str(message)) if !message.is_empty() => message,
                _ => format!("host callback failed with status {status}"),
            };
            return Err(CallbackError::new(message));
        }
        decoded
    }
}

/// Hands a host buffer back to the host allocator, if it provided one.
pub fn release(free: Option<RtFreeFn>, ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    if let Some(free) = free {
        // SAFETY: `ptr` came from the host and has not been released yet.
        unsafe { free(ptr) }
    }
}

/// Copies a NUL-terminated host string and releases it.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string owned by the host.
pub unsafe fn take_host_string(
    ptr: *mut c_char,
    free: Option<RtFreeFn>,
) -> Result<Option<String>, CallbackError> {
    if ptr.is_null() {
        return Ok(None);
    }
    let copied = CStr::from_ptr(ptr).to_bytes().to_vec();
    release(free, ptr.cast());
    utf8(copied).map(Some)
}

/// Copies a NULL-terminated array of host strings and releases every
/// element and the array itself.
///
/// # Safety
/// `array` must be null or point to a NULL-terminated array of valid
/// NUL-terminated strings owned by the host.
pub unsafe fn take_host_string_array(
    array: *mut *mut c_char,
    free: Option<RtFreeFn>,
) -> Result<Option<Vec<String>>, CallbackError> {
    if array.is_null() {
        return Ok(None);
    }
    let mut items = Vec::new();
    let mut failure = None;
    let mut cursor = array;
    while !(*cursor).is_null() {
        match take_host_string(*cursor, free) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(err) => failure = Some(err),
        }
        cursor = cursor.add(1);
    }
    release(free, array.cast());
    match failure {
        Some(err) => Err(err),
        None => Ok(Some(items)),
    }
}
