//! FFI layer for host applications.
//!
//! C-compatible functions over the pure engine. All data crosses the
//! boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `tracesync_*` functions are allocated by Rust
//! - Caller must free them with `tracesync_string_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{apply_change, feature_options, ChangeFeature, Configuration, Error, Pid};
use serde::de::DeserializeOwned;
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }

    fn into_c_string(self) -> *mut c_char {
        to_c_string(self.to_json())
    }
}

impl<T: serde::Serialize> From<Result<T, Error>> for FfiResult<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => FfiResult::ok(value),
            Err(e) => FfiResult::err(e.to_string()),
        }
    }
}

const NUL_ERROR: &[u8] = b"{\"error\":\"string contained null bytes\"}\0";

/// Convert a Rust string to a C string pointer.
/// Caller must free with `tracesync_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CStr::from_bytes_with_nul(NUL_ERROR)
            .map(|error| error.to_owned().into_raw())
            .unwrap_or(std::ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Read and decode a JSON argument; `invalid` builds the error for bad input.
unsafe fn parse_arg<T: DeserializeOwned>(
    ptr: *const c_char,
    what: &str,
    invalid: fn(String) -> Error,
) -> Result<T, Error> {
    let raw = from_c_string(ptr).ok_or_else(|| invalid(format!("missing {}", what)))?;
    serde_json::from_str(&raw).map_err(|e| invalid(format!("{}: {}", what, e)))
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `tracesync_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tracesync_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// The canonical empty configuration.
///
/// # Returns
/// JSON string: `{"ok": Configuration}`
///
/// # Safety
/// - Caller must free the returned string with `tracesync_string_free`
#[no_mangle]
pub extern "C" fn tracesync_empty_configuration() -> *mut c_char {
    FfiResult::ok(Configuration::empty()).into_c_string()
}

/// Apply a feature change to a configuration.
///
/// # Arguments
/// - `config_json`: JSON string of Configuration
/// - `change_json`: JSON string of ChangeFeature
///
/// # Returns
/// JSON string: `{"ok": Configuration}` or `{"error": "message"}`
///
/// # Safety
/// - Both arguments must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tracesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn tracesync_apply_change(
    config_json: *const c_char,
    change_json: *const c_char,
) -> *mut c_char {
    let result = parse_arg::<Configuration>(config_json, "configuration", Error::InvalidSnapshot)
        .and_then(|config| {
            let change: ChangeFeature = parse_arg(change_json, "change", Error::InvalidAction)?;
            Ok(apply_change(&config, &change))
        });
    FfiResult::from(result).into_c_string()
}

/// Compare two configurations structurally.
///
/// # Returns
/// JSON string: `{"ok": bool}` or `{"error": "message"}`
///
/// # Safety
/// - Both arguments must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tracesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn tracesync_configurations_equal(
    a_json: *const c_char,
    b_json: *const c_char,
) -> *mut c_char {
    let result = parse_arg::<Configuration>(a_json, "configuration", Error::InvalidSnapshot)
        .and_then(|a| {
            let b: Configuration = parse_arg(b_json, "configuration", Error::InvalidSnapshot)?;
            Ok(a == b)
        });
    FfiResult::from(result).into_c_string()
}

/// Project a configuration onto the PIDs being edited.
///
/// # Arguments
/// - `config_json`: JSON string of Configuration
/// - `pids_json`: JSON array of PIDs
///
/// # Returns
/// JSON string: `{"ok": [FeatureOption, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - Both arguments must be valid null-terminated C strings or null
/// - Caller must free the returned string with `tracesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn tracesync_feature_options(
    config_json: *const c_char,
    pids_json: *const c_char,
) -> *mut c_char {
    let result = parse_arg::<Configuration>(config_json, "configuration", Error::InvalidSnapshot)
        .and_then(|config| {
            let pids: Vec<Pid> = parse_arg(pids_json, "pids", Error::InvalidAction)?;
            Ok(feature_options(&config, &pids))
        });
    FfiResult::from(result).into_c_string()
}

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn tracesync_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    unsafe fn take(result: *mut c_char) -> serde_json::Value {
        let json = CStr::from_ptr(result).to_str().unwrap().to_string();
        tracesync_string_free(result);
        serde_json::from_str(&json).unwrap()
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn ffi_empty_configuration() {
        unsafe {
            let value = take(tracesync_empty_configuration());
            let config: Configuration = serde_json::from_value(value["ok"].clone()).unwrap();
            assert_eq!(config, Configuration::empty());
        }
    }

    #[test]
    fn ffi_apply_change() {
        unsafe {
            let config = c(&serde_json::to_string(&Configuration::empty()).unwrap());
            let change = c(r#"{"feature":{"type":"gc"},"enable":true,"pids":[4,2]}"#);

            let value = take(tracesync_apply_change(config.as_ptr(), change.as_ptr()));
            assert_eq!(value["ok"]["gc"], serde_json::json!([2, 4]));
            assert_eq!(value["ok"]["vfsWrite"], serde_json::Value::Null);
        }
    }

    #[test]
    fn ffi_configurations_equal() {
        unsafe {
            let a = c(r#"{"gc":[1,2]}"#);
            let b = c(r#"{"gc":[2,1]}"#);
            let absent = c(r#"{}"#);

            assert_eq!(
                take(tracesync_configurations_equal(a.as_ptr(), b.as_ptr()))["ok"],
                true
            );
            assert_eq!(
                take(tracesync_configurations_equal(a.as_ptr(), absent.as_ptr()))["ok"],
                false
            );
        }
    }

    #[test]
    fn ffi_feature_options() {
        unsafe {
            let config = c(r#"{"vfsWrite":[7]}"#);
            let pids = c("[7]");
            let value = take(tracesync_feature_options(config.as_ptr(), pids.as_ptr()));
            let options = value["ok"].as_array().unwrap();
            let vfs = options
                .iter()
                .find(|o| o["feature"]["type"] == "vfs_write")
                .unwrap();
            assert_eq!(vfs["enabled"], true);
        }
    }

    #[test]
    fn ffi_version() {
        unsafe {
            let version = CStr::from_ptr(tracesync_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn ffi_error_handling() {
        unsafe {
            let config = c("{}");

            let value = take(tracesync_apply_change(config.as_ptr(), ptr::null()));
            assert!(value["error"]
                .as_str()
                .unwrap()
                .starts_with("invalid action"));

            let bad = c("not valid json");
            let value = take(tracesync_apply_change(bad.as_ptr(), config.as_ptr()));
            assert!(value["error"]
                .as_str()
                .unwrap()
                .starts_with("invalid snapshot"));

            let unknown = c(r#"{"feature":{"type":"kprobe"},"enable":true,"pids":[1]}"#);
            let value = take(tracesync_apply_change(config.as_ptr(), unknown.as_ptr()));
            assert!(value["error"].is_string());
        }
    }
}
