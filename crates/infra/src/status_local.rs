//! Read a repository's status record from the configured store.

use crate::runtime::run_async_with_ctx;
use crate::InfraResult;
use clone_pipeline_adapters::FsStatusStore;
use clone_pipeline_app::{ReadStatusDeps, read_repository_status as read_status};
use clone_pipeline_config::load_pipeline_config_std_env;
use clone_pipeline_domain::RepositoryRecord;
use clone_pipeline_shared::RequestContext;
use std::path::Path;
use std::sync::Arc;

/// Resolve `url` and return its stored record (`core:not_found` when absent).
pub fn read_repository_status(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    url: &str,
) -> InfraResult<RepositoryRecord> {
    let config = load_pipeline_config_std_env(config_path, overrides_json)?;
    let deps = ReadStatusDeps {
        status_store: Arc::new(FsStatusStore::new(config.status_path())),
    };
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        read_status(&ctx, &deps, url, config.url_policy()).await
    })
}
