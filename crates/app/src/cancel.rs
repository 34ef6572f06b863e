//! Cancel an in-flight clone of one repository.

use crate::CancellationRegistry;
use clone_pipeline_domain::{CancellationReason, JobKey, RepositoryPatch, RepositoryUri};
use clone_pipeline_ports::{LogFields, LoggerPort, StatusPatch, StatusStorePort};
use clone_pipeline_shared::{RequestContext, Result};
use serde_json::Value;
use std::sync::Arc;

/// Dependencies required by [`cancel_clone`].
#[derive(Clone)]
pub struct CancelCloneDeps {
    /// Cancel handles of in-flight jobs.
    pub registry: Arc<CancellationRegistry>,
    /// Status record store.
    pub status_store: Arc<dyn StatusStorePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

/// Signal the clone job for `uri`.
///
/// Returns true when a running job was signalled; only then is the record
/// marked cancelled.
pub async fn cancel_clone(
    ctx: &RequestContext,
    deps: &CancelCloneDeps,
    uri: &RepositoryUri,
    reason: CancellationReason,
) -> Result<bool> {
    let signalled = deps.registry.cancel(&JobKey::clone_job(uri.clone()), reason);

    if let Some(logger) = deps.logger.as_ref() {
        let mut fields = LogFields::new();
        fields.insert("uri".into(), Value::String(uri.as_str().to_owned()));
        fields.insert("reason".into(), Value::String(reason.as_str().to_owned()));
        fields.insert("signalled".into(), Value::Bool(signalled));
        logger.info("clone.cancel", "Clone cancellation requested", Some(fields));
    }

    if !signalled {
        return Ok(false);
    }

    let patch = RepositoryPatch {
        cancelled: Some(true),
        ..RepositoryPatch::default()
    };
    deps.status_store
        .update(ctx, uri, StatusPatch::Repository(patch))
        .await?;
    Ok(true)
}
