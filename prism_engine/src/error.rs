//! Error types for the Prism engine
//!
//! Every fallible operation in the engine returns [`Result`]. Failures are
//! logged at the point of detection through the `engine_err!` family of
//! macros and then propagated with `?` up to the application loop.

use std::fmt;

/// Result type for Prism engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failures, with the result code embedded)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or argument (unknown binding, size mismatch, stale handle, ...)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain)
    InitializationFailed(String),

    /// A fixed-capacity resource ran out of room (ring staging buffer, sub-allocator)
    ResourceExhausted(String),

    /// An operation was issued in a state that does not allow it
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error message and build the matching [`Error`]
///
/// Without a variant the error is a `BackendError`. Use the `=>` form to pick
/// another tuple variant.
///
/// # Example
///
/// ```no_run
/// # use prism_engine::{engine_err, prism::Error};
/// let a = engine_err!("prism::vulkan", "vkCreateBuffer failed: {:?}", -2);
/// let b = engine_err!("prism::ShaderPipeline" => Error::InvalidResource, "unknown binding '{}'", "albedo");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr => $kind:path, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $kind(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_err!($source => $crate::prism::Error::BackendError, $($arg)*)
    };
}

/// Log an error message and return early with the matching [`Error`]
#[macro_export]
macro_rules! engine_bail {
    ($source:expr => $kind:path, $($arg:tt)*) => {
        return Err($crate::engine_err!($source => $kind, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Same as `engine_err!` but logged at WARN severity
///
/// Used for failures the caller is expected to handle (skipped frame, cache miss).
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr => $kind:path, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $kind(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_warn_err!($source => $crate::prism::Error::BackendError, $($arg)*)
    };
}

/// Same as `engine_bail!` but logged at WARN severity
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr => $kind:path, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source => $kind, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
