//! FFI bindings for Pulse Flux
//!
//! This module provides C-compatible functions for calling Flux from the mobile
//! app. Strings are null-terminated; returned strings are heap allocated and
//! must be freed by the caller using `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::PipelineConfig;
use crate::emotion::{calculate_emotional_indices, EmotionInputs};
use crate::pipeline::VitalsProcessor;
use crate::reward::RewardEncoder;
use crate::types::PracticeMetrics;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

// ============================================================================
// Stateless API
// ============================================================================

/// Compute a reward receipt from practice metrics JSON.
///
/// # Safety
/// - `metrics_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_calculate_practice_ond(metrics_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(metrics_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let metrics: PracticeMetrics = match serde_json::from_str(&json_str) {
        Ok(m) => m,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match RewardEncoder::new().encode_to_json(&metrics) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Compute emotional indices from an inputs JSON object.
///
/// # Safety
/// - `inputs_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_emotional_indices(inputs_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(inputs_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let inputs: EmotionInputs = match serde_json::from_str(&json_str) {
        Ok(i) => i,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&calculate_emotional_indices(&inputs)) {
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

/// Opaque handle to a VitalsProcessor
pub struct VitalsProcessorHandle {
    processor: VitalsProcessor,
}

/// Create a new processor, optionally from a configuration JSON.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `pulse_processor_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_new(config_json: *const c_char) -> *mut VitalsProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        PipelineConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match PipelineConfig::from_json(&json_str) {
            Ok(c) => c,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match VitalsProcessor::with_config(config) {
        Ok(processor) => Box::into_raw(Box::new(VitalsProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_free(processor: *mut VitalsProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Push a heart-rate sample.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - Returns 0 on success, non-zero on error; call `pulse_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_push_heart_rate(
    processor: *mut VitalsProcessorHandle,
    t: f64,
    bpm: f64,
) -> i32 {
    clear_last_error();
    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;
    match handle.processor.push_heart_rate(t, bpm) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Update the motion magnitude read at instant `t`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - Returns 0 on success, non-zero on error; call `pulse_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_push_motion(
    processor: *mut VitalsProcessorHandle,
    t: f64,
    magnitude: f64,
) -> i32 {
    clear_last_error();
    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;
    match handle.processor.push_motion(t, magnitude) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Run a tick and return the current vitals snapshot JSON.
///
/// The snapshot is returned even when the tick was skipped for lack of data.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_tick(
    processor: *mut VitalsProcessorHandle,
    now: f64,
) -> *mut c_char {
    clear_last_error();
    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;
    handle.processor.tick(now);

    match serde_json::to_string(handle.processor.snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Clear all session state, e.g. when the strap disconnects.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_reset(processor: *mut VitalsProcessorHandle) {
    if !processor.is_null() {
        (*processor).processor.reset();
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        pulse_free_string(ptr);
        s
    }

    #[test]
    fn test_reward_via_ffi() {
        let input = CString::new(
            r#"{"actual_duration_seconds":360,"expected_duration_seconds":360,
                "stress_before":50,"stress_after":45,"energy_before":50,"energy_after":55,
                "base_ond_reward":50,"has_real_metrics":true}"#,
        )
        .unwrap();

        unsafe {
            let json = take_string(pulse_calculate_practice_ond(input.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["reward"]["total_ond"], 50.0);
        }
    }

    #[test]
    fn test_invalid_json_sets_last_error() {
        let input = CString::new("not json").unwrap();
        unsafe {
            let result = pulse_calculate_practice_ond(input.as_ptr());
            assert!(result.is_null());
            assert!(!pulse_last_error().is_null());
        }
    }

    #[test]
    fn test_processor_lifecycle() {
        unsafe {
            let processor = pulse_processor_new(ptr::null());
            assert!(!processor.is_null());

            for i in 0..12 {
                assert_eq!(pulse_processor_push_heart_rate(processor, i as f64, 68.0), 0);
            }
            assert_eq!(pulse_processor_push_heart_rate(processor, 12.0, 900.0), -1);
            assert_eq!(pulse_processor_push_motion(processor, 11.5, 0.2), 0);
            assert_eq!(pulse_processor_push_motion(processor, 900.0, 0.2), -1);

            let json = take_string(pulse_processor_tick(processor, 12.0));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["hr"], 68.0);

            pulse_processor_reset(processor);
            let json = take_string(pulse_processor_tick(processor, 14.0));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(value["hr"].is_null());

            pulse_processor_free(processor);
        }
    }

    #[test]
    fn test_null_processor() {
        unsafe {
            assert_eq!(pulse_processor_push_heart_rate(ptr::null_mut(), 0.0, 70.0), -1);
            assert!(pulse_processor_tick(ptr::null_mut(), 0.0).is_null());
        }
    }
}
