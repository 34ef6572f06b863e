//! Read the status record of one repository.

use crate::CloneWorkerError;
use clone_pipeline_domain::{GitUrl, GitUrlPolicy, RepositoryRecord};
use clone_pipeline_ports::StatusStorePort;
use clone_pipeline_shared::{ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;

/// Dependencies required by [`read_repository_status`].
#[derive(Clone)]
pub struct ReadStatusDeps {
    /// Status record store.
    pub status_store: Arc<dyn StatusStorePort>,
}

/// Resolve `url` to its repository and return the stored record.
///
/// A repository that was never enqueued is a `core:not_found` error.
pub async fn read_repository_status(
    ctx: &RequestContext,
    deps: &ReadStatusDeps,
    url: &str,
    policy: &GitUrlPolicy,
) -> Result<RepositoryRecord> {
    ctx.ensure_not_cancelled("read_repository_status")?;
    let url = GitUrl::parse(url, policy).map_err(ErrorEnvelope::from)?;
    deps.status_store
        .get(ctx, url.uri())
        .await?
        .ok_or_else(|| {
            CloneWorkerError::StatusRecordMissing {
                uri: url.uri().as_str().to_owned(),
            }
            .into()
        })
}
