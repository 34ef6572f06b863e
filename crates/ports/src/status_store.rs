//! Repository status store boundary contract.

use crate::BoxFuture;
use clone_pipeline_domain::{CloneStatusPatch, RepositoryPatch, RepositoryRecord, RepositoryUri};
use clone_pipeline_shared::{RequestContext, Result};

/// Partial update of a stored [`RepositoryRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPatch {
    /// Repository-level fields (branch, revision, cancel marker).
    Repository(RepositoryPatch),
    /// Clone progress section.
    CloneStatus(CloneStatusPatch),
}

impl StatusPatch {
    /// Stable label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Repository(_) => "repository",
            Self::CloneStatus(_) => "cloneStatus",
        }
    }

    /// Apply the patch to a record in place.
    pub fn apply_to(&self, record: &mut RepositoryRecord) {
        match self {
            Self::Repository(patch) => record.apply_repository(patch),
            Self::CloneStatus(patch) => record.clone_status.apply(patch),
        }
    }
}

/// Durable per-repository status records.
///
/// Writes to one repository are applied in call order.
pub trait StatusStorePort: Send + Sync {
    /// Create or replace the record for `record.uri`.
    fn index<'a>(&'a self, ctx: &'a RequestContext, record: RepositoryRecord)
    -> BoxFuture<'a, Result<()>>;

    /// Patch an existing record. Fails with `core:not_found` if it is missing.
    fn update<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
        patch: StatusPatch,
    ) -> BoxFuture<'a, Result<()>>;

    /// Read the current record, if any.
    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
    ) -> BoxFuture<'a, Result<Option<RepositoryRecord>>>;
}
