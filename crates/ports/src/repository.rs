//! Repository service boundary contracts.
//!
//! A repository service performs the git transfer for one repository root.
//! The worker obtains a fresh service per job through
//! [`RepositoryServiceFactoryPort`] and never holds one across jobs.

use crate::BoxFuture;
use clone_pipeline_domain::{CloneOptions, CloneProgressUpdate, GitUrl};
use clone_pipeline_shared::{RequestContext, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Receives progress samples while a clone runs.
///
/// Called from the transfer task; implementations must not block.
pub trait CloneProgressSink: Send + Sync {
    /// Record one progress sample.
    fn report(&self, update: CloneProgressUpdate);
}

/// Input for a single clone.
#[derive(Debug, Clone)]
pub struct CloneRequest {
    /// Validated source URL.
    pub url: GitUrl,
    /// Directory the working copy is written to.
    pub target: PathBuf,
    /// Branch and depth knobs.
    pub options: CloneOptions,
}

/// What a finished clone produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Remote default branch (or the requested branch).
    pub default_branch: Box<str>,
    /// Commit checked out.
    pub head_revision: Box<str>,
    /// Working copy location.
    pub path: PathBuf,
}

/// Performs git transfers.
pub trait RepositoryServicePort: Send + Sync {
    /// Clone `request.url` into `request.target`.
    ///
    /// Must stop promptly once `ctx` is cancelled, leave no partial working
    /// copy behind, and return a cancelled error.
    fn clone_repository<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: CloneRequest,
        progress: Arc<dyn CloneProgressSink>,
    ) -> BoxFuture<'a, Result<CloneOutcome>>;
}

/// Creates repository services bound to a repository root.
pub trait RepositoryServiceFactoryPort: Send + Sync {
    /// New service instance for clones under `repo_root`.
    fn new_instance(&self, repo_root: &Path) -> Arc<dyn RepositoryServicePort>;
}
