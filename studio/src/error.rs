//! Shared error conventions.
//!
//! Every service error enum implements [`ErrorCode`] so notices and logs can
//! carry a grepable code and a retryable flag alongside the message.

/// Grepable error code and retryable flag for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
