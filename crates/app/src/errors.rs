//! Clone worker failures mapped to `ErrorEnvelope`.

use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::fmt;

/// Typed failures raised by the clone worker and its admission policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneWorkerError {
    /// Free disk space is at or below the low watermark.
    AdmissionRejected {
        /// Configured threshold, when known.
        threshold: Option<Box<str>>,
    },
    /// The disk probe failed, so admission could not be decided.
    AdmissionProbeFailed {
        /// Probed path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// The status record for a repository does not exist.
    StatusRecordMissing {
        /// Repository URI.
        uri: String,
    },
}

impl CloneWorkerError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::AdmissionRejected { .. } => ErrorCode::new("clone", "admission_rejected"),
            Self::AdmissionProbeFailed { .. } => ErrorCode::new("clone", "admission_probe_failed"),
            Self::StatusRecordMissing { .. } => ErrorCode::not_found(),
        }
    }
}

impl fmt::Display for CloneWorkerError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdmissionRejected { threshold: Some(threshold) } => write!(
                formatter,
                "not enough free disk space to clone (low watermark {threshold})"
            ),
            Self::AdmissionRejected { threshold: None } => {
                formatter.write_str("not enough free disk space to clone")
            },
            Self::AdmissionProbeFailed { reason, .. } => {
                write!(formatter, "disk usage probe failed: {reason}")
            },
            Self::StatusRecordMissing { uri } => {
                write!(formatter, "no status record for repository {uri}")
            },
        }
    }
}

impl std::error::Error for CloneWorkerError {}

impl From<CloneWorkerError> for ErrorEnvelope {
    fn from(error: CloneWorkerError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        match error {
            CloneWorkerError::AdmissionRejected { threshold } => {
                let envelope = Self::expected_with_class(code, message, ErrorClass::Retriable);
                match threshold {
                    Some(threshold) => envelope.with_metadata("threshold", threshold.as_ref()),
                    None => envelope,
                }
            },
            CloneWorkerError::AdmissionProbeFailed { path, reason } => {
                Self::unexpected(code, message, ErrorClass::Retriable)
                    .with_metadata("path", path)
                    .with_metadata("reason", reason)
            },
            CloneWorkerError::StatusRecordMissing { uri } => {
                Self::expected(code, message).with_metadata("uri", uri)
            },
        }
    }
}
