//! Run one clone end to end in this process.

use crate::pipeline::{Pipeline, PipelinePorts, build_pipeline};
use crate::runtime::run_async_with_ctx;
use crate::{InfraResult, Observability};
use clone_pipeline_adapters::JobOutcome;
use clone_pipeline_app::{CancelCloneDeps, CloneJobResult, cancel_clone};
use clone_pipeline_config::{
    CloneRequestDto, ValidatedCloneRequest, load_pipeline_config_std_env, validate_clone_request,
};
use clone_pipeline_domain::{
    CancellationReason, CloneJobPayload, JobId, RepositoryRecord, RepositoryUri,
};
use clone_pipeline_ports::BoxFuture;
use clone_pipeline_shared::{ErrorEnvelope, RequestContext};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Future that resolves when the operator asks to stop.
pub type Interrupt = BoxFuture<'static, ()>;

/// How a local clone ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CloneRunOutcome {
    /// The working copy is in place.
    Cloned {
        /// Default (or requested) branch.
        default_branch: Box<str>,
        /// Revision at `HEAD`.
        head_revision: Box<str>,
        /// Working copy location.
        path: PathBuf,
    },
    /// The clone stopped on cancellation.
    Cancelled {
        /// Why, when known.
        reason: Option<CancellationReason>,
    },
    /// There was nothing to clone.
    Skipped,
    /// The final attempt failed.
    Failed {
        /// Failure of the final attempt.
        error: ErrorEnvelope,
    },
    /// The final attempt exceeded its deadline.
    TimedOut,
}

impl CloneRunOutcome {
    fn from_job(outcome: JobOutcome<CloneJobResult>) -> Self {
        match outcome {
            JobOutcome::Completed(result) if result.cancelled => Self::Cancelled {
                reason: result.cancellation_reason,
            },
            JobOutcome::Completed(result) => match result.repository {
                Some(repository) => Self::Cloned {
                    default_branch: repository.default_branch,
                    head_revision: repository.head_revision,
                    path: repository.path,
                },
                None => Self::Skipped,
            },
            JobOutcome::Failed(error) => Self::Failed { error },
            JobOutcome::TimedOut => Self::TimedOut,
        }
    }
}

/// Result of [`run_clone`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneReport {
    /// Queue-assigned job id.
    pub job_id: JobId,
    /// Repository identity.
    pub uri: RepositoryUri,
    /// How the job ended.
    pub outcome: CloneRunOutcome,
    /// Status record after the job settled.
    pub record: Option<RepositoryRecord>,
}

/// Load config, clone `request`, and wait for the index enqueue.
///
/// Ctrl-C cancels the clone.
pub fn run_clone(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    request: &CloneRequestDto,
) -> InfraResult<CloneReport> {
    let config = load_pipeline_config_std_env(config_path, overrides_json)?;
    let request = validate_clone_request(request, config.url_policy())?;
    let observability = Observability::from_std_env();

    run_async_with_ctx(RequestContext::new_request(), move |ctx| async move {
        let mut ports = PipelinePorts::from_config(&config, &observability)?;
        ports.logger = observability.scoped_logger(&ctx);
        let pipeline = build_pipeline(&config, ports)?;
        run_clone_with(&ctx, &pipeline, &request, Some(ctrl_c())).await
    })
}

/// Clone through an already built pipeline, then shut it down.
///
/// When `interrupt` resolves before the job settles, the running clone is
/// cancelled through the registry; a job that has not started yet is
/// cancelled through `ctx`.
pub async fn run_clone_with(
    ctx: &RequestContext,
    pipeline: &Pipeline,
    request: &ValidatedCloneRequest,
    interrupt: Option<Interrupt>,
) -> InfraResult<CloneReport> {
    let uri = request.url.uri().clone();
    let payload = CloneJobPayload {
        url: request.url.as_str().into(),
        options: request.options.clone(),
    };

    let handle = pipeline
        .queue
        .enqueue(ctx, payload, request.job_options.clone())
        .await?;
    let job_id = handle.job_id().clone();

    let watcher = interrupt
        .map(|interrupt| InterruptWatcher::spawn(ctx, pipeline.cancel_deps(), uri.clone(), interrupt));
    let outcome = handle.wait().await;
    if let Some(watcher) = watcher {
        watcher.finish().await;
    }
    pipeline.shutdown().await;
    let outcome = CloneRunOutcome::from_job(outcome?);

    let record = pipeline
        .ports
        .status_store
        .get(&RequestContext::new_request(), &uri)
        .await?;

    Ok(CloneReport {
        job_id,
        uri,
        outcome,
        record,
    })
}

fn ctrl_c() -> Interrupt {
    Box::pin(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
}

/// Background task that turns an interrupt into a cancel request.
struct InterruptWatcher {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl InterruptWatcher {
    fn spawn(
        ctx: &RequestContext,
        deps: CancelCloneDeps,
        uri: RepositoryUri,
        interrupt: Interrupt,
    ) -> Self {
        let job_ctx = ctx.clone();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = tokio::spawn(async move {
            interrupt.await;
            flag.store(true, Ordering::SeqCst);
            let cancel_ctx = RequestContext::new_request();
            match cancel_clone(&cancel_ctx, &deps, &uri, CancellationReason::UserCancel).await {
                Ok(true) => {},
                Ok(false) => job_ctx.cancel(),
                Err(error) => {
                    tracing::warn!(code = %error.code, message = %error.message, "cancel request failed");
                    job_ctx.cancel();
                },
            }
        });
        Self { handle, fired }
    }

    /// Let a fired cancel request finish its status write; drop an idle watcher.
    async fn finish(self) {
        if !self.fired.load(Ordering::SeqCst) {
            self.handle.abort();
        }
        if let Err(error) = self.handle.await
            && error.is_panic()
        {
            tracing::warn!(%error, "interrupt watcher failed");
        }
    }
}
