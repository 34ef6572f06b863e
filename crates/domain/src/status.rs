//! Repository status records and their partial updates.
//!
//! The status store keeps one [`RepositoryRecord`] per repository. The clone
//! worker creates it on enqueue, patches it while cloning, and settles it on
//! completion. Observers poll it; they must never see an in-progress clone
//! status once the completion hook has returned.

use crate::RepositoryUri;
use serde::{Deserialize, Serialize};

/// Progress value written when a clone job is accepted.
pub const PROGRESS_INIT: u8 = 0;
/// Progress value written when a clone has finished.
pub const PROGRESS_COMPLETED: u8 = 100;

/// Lifecycle phase of the most recent clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClonePhase {
    /// Accepted by the queue, not started.
    Queued,
    /// Transfer in progress.
    Cloning,
    /// Working copy is complete.
    Cloned,
    /// The job failed.
    Failed,
    /// The job exceeded its deadline.
    TimedOut,
}

impl ClonePhase {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Cloning => "cloning",
            Self::Cloned => "cloned",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Returns true for phases a finished job leaves behind.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cloned | Self::Failed | Self::TimedOut)
    }
}

/// Object counters reported by the transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneObjectCounts {
    /// Objects received so far.
    pub received_objects: u64,
    /// Total objects announced by the remote.
    pub total_objects: u64,
    /// Objects indexed locally.
    pub indexed_objects: u64,
}

/// A progress sample pushed by the repository service during a clone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneProgressUpdate {
    /// Completion percentage (0-100).
    pub percentage: u8,
    /// Object counters, when the transfer reports them.
    pub objects: Option<CloneObjectCounts>,
}

/// Clone progress section of a repository record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneStatus {
    /// Completion percentage (0-100).
    pub progress: u8,
    /// Lifecycle phase.
    pub phase: ClonePhase,
    /// Object counters from the last progress sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<CloneObjectCounts>,
    /// Head revision once cloned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Box<str>>,
    /// Failure message for failed or timed-out clones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Box<str>>,
    /// Last write time (epoch ms).
    pub updated_at_ms: u64,
}

impl CloneStatus {
    /// Status written on enqueue.
    #[must_use]
    pub const fn queued(now_ms: u64) -> Self {
        Self {
            progress: PROGRESS_INIT,
            phase: ClonePhase::Queued,
            objects: None,
            revision: None,
            error_message: None,
            updated_at_ms: now_ms,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &CloneStatusPatch) {
        if let Some(progress) = patch.progress {
            self.progress = progress.min(PROGRESS_COMPLETED);
        }
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(objects) = patch.objects {
            self.objects = Some(objects);
        }
        if let Some(revision) = &patch.revision {
            self.revision = Some(revision.clone());
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at_ms = patch.updated_at_ms;
    }
}

/// Partial update of a [`CloneStatus`]. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneStatusPatch {
    /// New progress value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// New phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ClonePhase>,
    /// New object counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<CloneObjectCounts>,
    /// Head revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Box<str>>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Box<str>>,
    /// Write time (epoch ms).
    pub updated_at_ms: u64,
}

impl CloneStatusPatch {
    /// An empty patch stamped at `now_ms`.
    #[must_use]
    pub const fn at(now_ms: u64) -> Self {
        Self {
            progress: None,
            phase: None,
            objects: None,
            revision: None,
            error_message: None,
            updated_at_ms: now_ms,
        }
    }

    /// Patch for an in-flight progress sample.
    #[must_use]
    pub const fn cloning(update: CloneProgressUpdate, now_ms: u64) -> Self {
        let mut patch = Self::at(now_ms);
        patch.progress = Some(update.percentage);
        patch.phase = Some(ClonePhase::Cloning);
        patch.objects = update.objects;
        patch
    }

    /// Terminal patch for a failed or timed-out clone.
    #[must_use]
    pub fn failed(phase: ClonePhase, message: impl Into<Box<str>>, now_ms: u64) -> Self {
        let mut patch = Self::at(now_ms);
        patch.phase = Some(phase);
        patch.error_message = Some(message.into());
        patch
    }
}

/// Partial update of the repository-level fields of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPatch {
    /// Default branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<Box<str>>,
    /// Head revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_revision: Option<Box<str>>,
    /// Cancellation marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
}

/// Per-repository status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    /// Repository identity.
    pub uri: RepositoryUri,
    /// Credential-free URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Box<str>>,
    /// Default branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<Box<str>>,
    /// Head revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_revision: Option<Box<str>>,
    /// Progress of the most recent clone.
    pub clone_status: CloneStatus,
    /// True when the most recent clone was cancelled.
    #[serde(default)]
    pub cancelled: bool,
}

impl RepositoryRecord {
    /// Fresh record written when a clone job is enqueued.
    #[must_use]
    pub const fn queued(uri: RepositoryUri, url: Option<Box<str>>, now_ms: u64) -> Self {
        Self {
            uri,
            url,
            default_branch: None,
            head_revision: None,
            clone_status: CloneStatus::queued(now_ms),
            cancelled: false,
        }
    }

    /// Returns true once the clone reached a terminal phase or was cancelled.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.cancelled || self.clone_status.phase.is_terminal()
    }

    /// Apply a repository-level patch in place.
    pub fn apply_repository(&mut self, patch: &RepositoryPatch) {
        if let Some(branch) = &patch.default_branch {
            self.default_branch = Some(branch.clone());
        }
        if let Some(revision) = &patch.head_revision {
            self.head_revision = Some(revision.clone());
        }
        if let Some(cancelled) = patch.cancelled {
            self.cancelled = cancelled;
        }
    }
}

/// Compute a completion percentage (0-100) from counters.
#[must_use]
pub fn progress_percentage(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = current.min(total).saturating_mul(100) / total;
    u8::try_from(pct).unwrap_or(PROGRESS_COMPLETED)
}
