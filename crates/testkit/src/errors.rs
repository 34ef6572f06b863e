//! Error fixtures shared by clone pipeline tests.

use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

/// Common error codes used in tests.
pub fn common_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode::cancelled(),
        ErrorCode::invalid_input(),
        ErrorCode::not_found(),
        ErrorCode::timeout(),
        ErrorCode::io(),
        ErrorCode::internal(),
    ]
}

/// A cancellation error fixture.
pub fn cancelled_error() -> ErrorEnvelope {
    ErrorEnvelope::cancelled("cancelled")
}

/// A retriable transfer failure (network hiccup during a clone).
pub fn transfer_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("git", "clone_failed"),
        "remote hung up unexpectedly",
        ErrorClass::Retriable,
    )
}

/// A non-retriable failure (repository does not exist).
pub fn missing_remote_error() -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("git", "repository_not_found"),
        "repository not found",
    )
}

/// A retriable status store failure.
pub fn status_write_error() -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("status", "write_failed"),
        "status store unavailable",
        ErrorClass::Retriable,
    )
}
