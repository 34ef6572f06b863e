//! Job queue boundary contracts.

use crate::BoxFuture;
use clone_pipeline_domain::{IndexJobPayload, Job};
use clone_pipeline_shared::{ErrorEnvelope, RequestContext, Result};

/// Downstream queue that receives index jobs for freshly cloned repositories.
pub trait IndexQueuePort: Send + Sync {
    /// Enqueue an index job.
    fn enqueue_index_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: Job<IndexJobPayload>,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Lifecycle hooks a queue drives for each job of one kind.
///
/// The queue calls `on_job_enqueued` before accepting a job, then
/// `execute_job` (once per attempt), and finally exactly one of
/// `on_job_completed`, `on_job_execution_error`, or `on_job_timeout`.
pub trait JobWorkerPort: Send + Sync {
    /// Job payload type.
    type Payload: Clone + Send + Sync + 'static;
    /// Result handed from `execute_job` to `on_job_completed`.
    type Output: Send + 'static;

    /// Queue name, used for logs and job ids.
    fn queue_name(&self) -> &'static str;

    /// Called before the job is accepted. An error rejects the job.
    fn on_job_enqueued<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: &'a Job<Self::Payload>,
    ) -> BoxFuture<'a, Result<()>>;

    /// Run one attempt.
    fn execute_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: &'a Job<Self::Payload>,
    ) -> BoxFuture<'a, Result<Self::Output>>;

    /// Called once after a successful attempt.
    fn on_job_completed<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: &'a Job<Self::Payload>,
        output: Self::Output,
    ) -> BoxFuture<'a, Result<()>>;

    /// Called once after the final failed attempt.
    fn on_job_execution_error<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: &'a Job<Self::Payload>,
        error: &'a ErrorEnvelope,
    ) -> BoxFuture<'a, Result<()>>;

    /// Called once when the final attempt exceeded its deadline.
    fn on_job_timeout<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: &'a Job<Self::Payload>,
    ) -> BoxFuture<'a, Result<()>>;
}
