//! FFI bindings for the measurement decoder
//!
//! This module provides C-compatible functions for calling the decoder from the
//! mobile host. Strings are null-terminated UTF-8; every returned string must be
//! freed by the caller using `engagehf_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use uuid::Uuid;

use crate::error::ObservationError;
use crate::observation::{ObservationMapper, SystemTimeProvider};
use crate::pipeline::{decode_notification, Notification, NotificationProcessor};
use crate::types::Measurement;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn uuid_arg(ptr: *const c_char, name: &str) -> Result<Uuid, String> {
    let s = cstr_to_string(ptr).ok_or_else(|| format!("Invalid {name} string pointer"))?;
    Uuid::parse_str(&s).map_err(|e| format!("Invalid {name} UUID: {e}"))
}

// ============================================================================
// Stateless API
// ============================================================================

/// Decode a characteristic payload and return the measurement as JSON.
///
/// # Safety
/// - `service` and `characteristic` must be valid null-terminated UUID strings.
/// - `data` must point to `len` readable bytes, or be NULL when `len` is 0.
/// - Returns a newly allocated string that must be freed with `engagehf_free_string`.
/// - Returns NULL if the payload is not a supported measurement or is malformed;
///   call `engagehf_last_error` to get the reason.
#[no_mangle]
pub unsafe extern "C" fn engagehf_decode(
    service: *const c_char,
    characteristic: *const c_char,
    data: *const u8,
    len: usize,
) -> *mut c_char {
    clear_last_error();

    let (service, characteristic) = match (
        uuid_arg(service, "service"),
        uuid_arg(characteristic, "characteristic"),
    ) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(e), _) | (_, Err(e)) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    let payload: &[u8] = if len == 0 {
        &[]
    } else if data.is_null() {
        set_last_error("Null data pointer");
        return ptr::null_mut();
    } else {
        slice::from_raw_parts(data, len)
    };

    match decode_notification(service, characteristic, payload) {
        Some(measurement) => match serde_json::to_string(&measurement) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => {
            set_last_error("Payload is not a supported measurement or is malformed");
            ptr::null_mut()
        }
    }
}

/// Map a measurement (as returned by `engagehf_decode`) to observation records.
///
/// # Safety
/// - `measurement_json` must be a valid null-terminated C string.
/// - Returns a newly allocated JSON array that must be freed with `engagehf_free_string`.
/// - Returns NULL on error; call `engagehf_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn engagehf_to_observations(measurement_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(measurement_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<Measurement>(&json_str)
        .map_err(ObservationError::from)
        .and_then(|m| ObservationMapper::new(SystemTimeProvider).map_to_json(&m));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a NotificationProcessor
pub struct NotificationProcessorHandle {
    processor: NotificationProcessor,
}

/// Create a notification processor using the system clock.
///
/// # Safety
/// - Returns a pointer that must be freed with `engagehf_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn engagehf_processor_new() -> *mut NotificationProcessorHandle {
    clear_last_error();
    Box::into_raw(Box::new(NotificationProcessorHandle {
        processor: NotificationProcessor::new(),
    }))
}

/// Free a notification processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engagehf_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engagehf_processor_free(processor: *mut NotificationProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Process one notification given as JSON
/// (`{"service": "...", "characteristic": "...", "payload": [..]}`).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engagehf_processor_new`.
/// - `notification_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string (measurement plus observations) that must
///   be freed with `engagehf_free_string`.
/// - Returns NULL when nothing was decoded or on error; call `engagehf_last_error`.
#[no_mangle]
pub unsafe extern "C" fn engagehf_processor_process(
    processor: *mut NotificationProcessorHandle,
    notification_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(notification_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let notification: Notification = match serde_json::from_str(&json_str) {
        Ok(n) => n,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match handle.processor.process(&notification) {
        Some(processed) => match serde_json::to_string(&processed) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => {
            set_last_error("Notification was not decoded");
            ptr::null_mut()
        }
    }
}

/// Return the processor's decoded/skipped counters as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `engagehf_processor_new`.
/// - Returns a newly allocated string that must be freed with `engagehf_free_string`.
#[no_mangle]
pub unsafe extern "C" fn engagehf_processor_stats(
    processor: *mut NotificationProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match serde_json::to_string(&handle.processor.stats()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an `engagehf_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn engagehf_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `engagehf_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn engagehf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn engagehf_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
