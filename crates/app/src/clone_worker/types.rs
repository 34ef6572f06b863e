//! Shared types for the clone worker.

use crate::CancellationRegistry;
use clone_pipeline_domain::{CancellationReason, GitUrlPolicy, RepositoryUri};
use clone_pipeline_ports::{
    DiskWatermarkPort, IndexQueuePort, LoggerPort, RepositoryServiceFactoryPort, SchedulerPort,
    StatusStorePort, TelemetryPort,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default delay between clone completion and the index enqueue.
pub const DEFAULT_INDEX_DEBOUNCE: Duration = Duration::from_secs(1);

/// Dependencies required by the clone worker.
#[derive(Clone)]
pub struct CloneWorkerDeps {
    /// Status record store.
    pub status_store: Arc<dyn StatusStorePort>,
    /// Disk admission policy.
    pub watermark: Arc<dyn DiskWatermarkPort>,
    /// Creates one repository service per execution.
    pub repository_factory: Arc<dyn RepositoryServiceFactoryPort>,
    /// Downstream index queue.
    pub index_queue: Arc<dyn IndexQueuePort>,
    /// Runs the debounced index enqueue.
    pub scheduler: Arc<dyn SchedulerPort>,
    /// Cancel handles of in-flight jobs.
    pub registry: Arc<CancellationRegistry>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// Worker settings derived from config.
#[derive(Debug, Clone)]
pub struct CloneWorkerSettings {
    /// Root under which working copies live (`<root>/<host>/<owner>/<name>`).
    pub repo_root: PathBuf,
    /// Host and protocol allowlists.
    pub url_policy: GitUrlPolicy,
    /// Minimum gap between progress writes.
    pub progress_interval: Duration,
    /// Delay between completion and the index enqueue.
    pub index_debounce: Duration,
}

impl CloneWorkerSettings {
    /// Settings with default intervals and a permissive URL policy.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            url_policy: GitUrlPolicy::permissive(),
            progress_interval: Duration::from_secs(1),
            index_debounce: DEFAULT_INDEX_DEBOUNCE,
        }
    }

    /// Working copy directory for `uri`.
    #[must_use]
    pub fn target_dir(&self, uri: &RepositoryUri) -> PathBuf {
        working_copy_dir(&self.repo_root, uri)
    }
}

/// `<root>/<host>/<owner>/<name>` for a repository.
#[must_use]
pub fn working_copy_dir(root: &Path, uri: &RepositoryUri) -> PathBuf {
    uri.segments().fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// A working copy produced by a successful clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedRepository {
    /// Repository identity.
    pub uri: RepositoryUri,
    /// Default (or checked out) branch.
    pub default_branch: Box<str>,
    /// Revision at `HEAD`.
    pub head_revision: Box<str>,
    /// Working copy location.
    pub path: PathBuf,
}

/// Output of one clone execution, handed to the completion hook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloneJobResult {
    /// The cloned repository; `None` when there was nothing to clone.
    pub repository: Option<ClonedRepository>,
    /// True when the job observed cancellation.
    pub cancelled: bool,
    /// Why the job was cancelled, when known.
    pub cancellation_reason: Option<CancellationReason>,
}

impl CloneJobResult {
    /// Result for a job that had nothing to do.
    #[must_use]
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Result for a job that stopped on cancellation.
    #[must_use]
    pub const fn cancelled(reason: Option<CancellationReason>) -> Self {
        Self {
            repository: None,
            cancelled: true,
            cancellation_reason: reason,
        }
    }

    /// Result for a finished clone.
    #[must_use]
    pub const fn cloned(repository: ClonedRepository) -> Self {
        Self {
            repository: Some(repository),
            cancelled: false,
            cancellation_reason: None,
        }
    }
}
