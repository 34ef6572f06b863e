//! # clone-pipeline-shared
//!
//! Shared utilities, result types, and error handling for the clone-pipeline
//! workspace.
//!
//! - Result and error envelope types
//! - Cancellation tokens and request context
//! - Retry helpers
//! - Redaction of secrets and URL credentials
//!
//! This crate has no workspace dependencies.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod invariants;
pub mod redaction;
pub mod result;
pub mod retry;
pub mod validation;

pub use concurrency::{CancellationToken, CorrelationId, RequestContext};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use invariants::{BoundedU32, BoundedU64, BoundsError, Validated};
pub use redaction::{REDACTED, is_secret_key, redact_if_secret, redact_url_credentials};
pub use result::Result;
pub use retry::{RetryPolicy, retry_async, retry_async_with_observer};
pub use validation::{Validate, ValidationError, require_non_empty};

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
