//! Job envelopes and payloads for the clone and index queues.

use crate::RepositoryUri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Kind of repository job tracked for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Full clone of a repository.
    Clone,
    /// Indexing of a cloned repository.
    Index,
    /// Incremental fetch of an existing clone.
    Update,
}

impl JobKind {
    /// All kinds, in a stable order.
    pub const ALL: [Self; 3] = [Self::Clone, Self::Index, Self::Update];

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Index => "index",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identity of an in-flight job for cancellation and progress purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    /// Job kind.
    pub kind: JobKind,
    /// Repository the job operates on.
    pub uri: RepositoryUri,
}

impl JobKey {
    /// Key for a clone job.
    #[must_use]
    pub const fn clone_job(uri: RepositoryUri) -> Self {
        Self {
            kind: JobKind::Clone,
            uri,
        }
    }

    /// Key for an index job.
    #[must_use]
    pub const fn index_job(uri: RepositoryUri) -> Self {
        Self {
            kind: JobKind::Index,
            uri,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.kind, self.uri)
    }
}

/// Why a job was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// An operator or client asked for it.
    UserCancel,
    /// The disk watermark was crossed.
    LowDiskSpace,
    /// A newer job for the same repository replaced this one.
    NewJobOverridden,
    /// The repository was deleted.
    RepositoryDelete,
}

impl CancellationReason {
    /// Stable snake_case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserCancel => "user_cancel",
            Self::LowDiskSpace => "low_disk_space",
            Self::NewJobOverridden => "new_job_overridden",
            Self::RepositoryDelete => "repository_delete",
        }
    }

    /// Parse a label produced by [`Self::as_str`].
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::UserCancel,
            Self::LowDiskSpace,
            Self::NewJobOverridden,
            Self::RepositoryDelete,
        ]
        .into_iter()
        .find(|reason| reason.as_str() == label)
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Job identifier assigned by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Box<str>);

impl JobId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into_boxed_str())
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Per-job knobs set by the enqueuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    /// Execution deadline override in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Attempt budget override (including the first try).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Clone-specific knobs passed through to the repository service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloneOptions {
    /// Branch to check out instead of the remote default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Box<str>>,
    /// Shallow clone depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

/// Payload of a clone job. The URL is validated by the worker hooks, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneJobPayload {
    /// Repository URL as requested.
    pub url: Box<str>,
    /// Clone knobs.
    #[serde(default)]
    pub options: CloneOptions,
}

impl CloneJobPayload {
    /// Payload with default clone options.
    #[must_use]
    pub fn new(url: impl Into<Box<str>>) -> Self {
        Self {
            url: url.into(),
            options: CloneOptions::default(),
        }
    }
}

/// Payload of the downstream index job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexJobPayload {
    /// Repository to index.
    pub uri: RepositoryUri,
    /// Revision (branch or commit) to index.
    pub revision: Box<str>,
}

/// A queued unit of work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job<P> {
    /// Queue-assigned identifier.
    pub id: JobId,
    /// Work description.
    pub payload: P,
    /// Per-job knobs.
    #[serde(default)]
    pub options: JobOptions,
    /// Enqueue time (epoch ms).
    pub enqueued_at_ms: u64,
}

impl<P> Job<P> {
    /// Create a job stamped with the current time.
    #[must_use]
    pub fn new(payload: P, options: JobOptions) -> Self {
        Self {
            id: JobId::generate(),
            payload,
            options,
            enqueued_at_ms: now_epoch_ms(),
        }
    }

    /// Execution deadline, falling back to `default`.
    #[must_use]
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.options.timeout_ms.map_or(default, Duration::from_millis)
    }
}

/// Milliseconds since the unix epoch (0 if the clock is before 1970).
#[must_use]
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
