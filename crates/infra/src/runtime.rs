//! Blocking entry points onto a tokio runtime.

use crate::{InfraError, InfraResult};
use clone_pipeline_shared::RequestContext;
use std::future::Future;

/// Build a runtime, run `op` with `ctx`, and block until it finishes.
pub fn run_async_with_ctx<F, T>(
    ctx: RequestContext,
    op: impl FnOnce(RequestContext) -> F,
) -> InfraResult<T>
where
    F: Future<Output = InfraResult<T>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(InfraError::from)?;
    runtime.block_on(async { op(ctx).await })
}
