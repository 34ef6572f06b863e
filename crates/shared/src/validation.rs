//! Validation traits for boundary DTOs.

/// Errors produced by [`Validate`] implementations.
pub trait ValidationError: Sized {
    /// A required field was empty.
    fn empty(field: &'static str) -> Self;

    /// A field value is invalid for a specific reason.
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self;
}

/// Shape validation for a boundary DTO before it is converted into a
/// domain request.
pub trait Validate {
    /// Error type returned by validation.
    type Error: ValidationError;

    /// Validate the DTO.
    fn validate(&self) -> Result<(), Self::Error>;
}

/// Trim `value` and reject it when empty.
pub fn require_non_empty<E: ValidationError>(field: &'static str, value: &str) -> Result<(), E> {
    if value.trim().is_empty() {
        return Err(E::empty(field));
    }
    Ok(())
}
