//! Clone request DTO and validation helpers.
//!
//! Requests are boundary inputs (CLI, JSON files) and must be validated before
//! being passed into use-cases. Validation here covers shape (required fields,
//! trimming, numeric bounds). URL rules are delegated to
//! [`GitUrl::parse`] under the configured allowlist policy.

use clone_pipeline_domain::{CloneOptions, GitUrl, GitUrlPolicy, JobOptions};
use clone_pipeline_shared::{
    ErrorCode, ErrorEnvelope, Validate, Validated, ValidationError, require_non_empty,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEPTH_MAX: u32 = 1_000_000;

/// Clone request payload (boundary DTO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CloneRequestDto {
    /// Repository URL (`https://`, `git://`, `ssh://` or `user@host:path`).
    pub url: String,
    /// Branch to check out instead of the remote default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Shallow clone depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Per-job deadline override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CloneRequestDto {
    /// DTO for a bare URL.
    #[must_use]
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
            depth: None,
            timeout_ms: None,
        }
    }
}

impl Validate for CloneRequestDto {
    type Error = RequestValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        require_non_empty("url", &self.url)?;
        if let Some(branch) = &self.branch {
            require_non_empty("branch", branch)?;
            if branch.trim().starts_with('-') {
                return Err(RequestValidationError::invalid(
                    "branch",
                    "must not start with '-'",
                ));
            }
        }
        if let Some(depth) = self.depth
            && !(1..=DEPTH_MAX).contains(&depth)
        {
            return Err(RequestValidationError::OutOfRange {
                field: "depth",
                value: depth.to_string(),
                min: "1".to_owned(),
                max: DEPTH_MAX.to_string(),
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(RequestValidationError::invalid(
                "timeoutMs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Validated clone request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    /// Parsed repository URL.
    pub url: GitUrl,
    /// Clone knobs.
    pub options: CloneOptions,
    /// Queue knobs.
    pub job_options: JobOptions,
}

/// Validated clone request proof.
pub type ValidatedCloneRequest = Validated<CloneRequest>;

/// Request validation errors mapped to `ErrorEnvelope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// A required string field is empty after trimming.
    EmptyField {
        /// Field name that failed validation.
        field: &'static str,
    },
    /// A field contains invalid content.
    InvalidField {
        /// Field name that failed validation.
        field: &'static str,
        /// Short reason describing why validation failed.
        reason: String,
    },
    /// A numeric field is out of bounds.
    OutOfRange {
        /// Field name that failed validation.
        field: &'static str,
        /// Value provided (stringified).
        value: String,
        /// Inclusive minimum bound (stringified).
        min: String,
        /// Inclusive maximum bound (stringified).
        max: String,
    },
}

impl RequestValidationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyField { .. } => ErrorCode::new("config", "empty_field"),
            Self::InvalidField { .. } => ErrorCode::new("config", "invalid_field"),
            Self::OutOfRange { .. } => ErrorCode::new("config", "out_of_range"),
        }
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField { field } => write!(formatter, "{field} must be non-empty"),
            Self::InvalidField { field, reason } => {
                write!(formatter, "{field} is invalid: {reason}")
            },
            Self::OutOfRange {
                field, min, max, ..
            } => write!(formatter, "{field} must be between {min} and {max}"),
        }
    }
}

impl std::error::Error for RequestValidationError {}

impl ValidationError for RequestValidationError {
    fn empty(field: &'static str) -> Self {
        Self::EmptyField { field }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<RequestValidationError> for ErrorEnvelope {
    fn from(error: RequestValidationError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            RequestValidationError::EmptyField { field } => envelope.with_metadata("field", field),
            RequestValidationError::InvalidField { field, reason } => envelope
                .with_metadata("field", field)
                .with_metadata("reason", reason),
            RequestValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value)
                .with_metadata("min", min)
                .with_metadata("max", max),
        }
    }
}

/// Validate and normalize a clone request against the URL policy.
pub fn validate_clone_request(
    dto: &CloneRequestDto,
    policy: &GitUrlPolicy,
) -> Result<ValidatedCloneRequest, ErrorEnvelope> {
    dto.validate().map_err(ErrorEnvelope::from)?;
    let url = GitUrl::parse(&dto.url, policy).map_err(ErrorEnvelope::from)?;

    Ok(Validated::new(CloneRequest {
        url,
        options: CloneOptions {
            branch: dto
                .branch
                .as_deref()
                .map(|branch| branch.trim().to_owned().into_boxed_str()),
            depth: dto.depth,
        },
        job_options: JobOptions {
            timeout_ms: dto.timeout_ms,
            max_attempts: None,
        },
    }))
}

/// Parse and validate a clone request from JSON.
pub fn parse_clone_request_json(
    input: &str,
    policy: &GitUrlPolicy,
) -> Result<ValidatedCloneRequest, ErrorEnvelope> {
    let dto: CloneRequestDto = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid clone request JSON: {error}"),
        )
        .with_metadata("request_kind", "clone")
    })?;
    validate_clone_request(&dto, policy)
}

/// JSON schema of [`CloneRequestDto`].
#[must_use]
pub fn clone_request_schema() -> schemars::Schema {
    schemars::schema_for!(CloneRequestDto)
}
