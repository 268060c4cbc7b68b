//! Unit tests for error.rs
//!
//! Tests Error variants, Display output and the error macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed: ERROR_DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("ERROR_DEVICE_LOST"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("unknown binding 'albedo'".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("albedo"));
}

#[test]
fn test_resource_exhausted_display() {
    let err = Error::ResourceExhausted("ring stage buffer full".to_string());
    assert_eq!(format!("{}", err), "Resource exhausted: ring stage buffer full");
}

#[test]
fn test_invalid_state_display() {
    let err = Error::InvalidState("draw without mesh".to_string());
    assert_eq!(format!("{}", err), "Invalid state: draw without mesh");
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::InitializationFailed("no device".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, Error::OutOfMemory);
}

// ============================================================================
// MACRO TESTS
// ============================================================================

fn bail_default(fail: bool) -> Result<u32> {
    if fail {
        crate::engine_bail!("prism::test", "failed with code {}", -4);
    }
    Ok(7)
}

fn bail_with_kind() -> Result<()> {
    crate::engine_bail!("prism::test" => Error::ResourceExhausted, "no block of {} bytes", 64);
}

#[test]
fn test_engine_err_defaults_to_backend_error() {
    let err = crate::engine_err!("prism::test", "vk result {}", -3);
    assert_eq!(err, Error::BackendError("vk result -3".to_string()));
}

#[test]
fn test_engine_err_with_explicit_variant() {
    let err = crate::engine_err!("prism::test" => Error::InvalidResource, "binding {}", 2);
    assert_eq!(err, Error::InvalidResource("binding 2".to_string()));
}

#[test]
fn test_engine_bail_returns_early() {
    assert_eq!(bail_default(false), Ok(7));
    assert_eq!(
        bail_default(true),
        Err(Error::BackendError("failed with code -4".to_string()))
    );
    assert_eq!(
        bail_with_kind(),
        Err(Error::ResourceExhausted("no block of 64 bytes".to_string()))
    );
}

#[test]
fn test_engine_warn_err() {
    let err = crate::engine_warn_err!("prism::test" => Error::InvalidState, "frame skipped");
    assert_eq!(err, Error::InvalidState("frame skipped".to_string()));
}
