//! In-process job queue driving a [`JobWorkerPort`].
//!
//! One consumer task executes jobs in enqueue order, so at most one job runs
//! at a time. Each attempt gets the job's deadline; retriable failures are
//! retried with backoff. Every accepted job ends in exactly one of the
//! completion, execution-error, or timeout hooks.

use clone_pipeline_domain::{Job, JobId, JobOptions};
use clone_pipeline_ports::{JobWorkerPort, LogFields, LoggerPort};
use clone_pipeline_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy,
    retry_async_with_observer,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queue knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InProcessQueueConfig {
    /// Deadline for jobs that carry no `timeout_ms`.
    pub default_timeout: Duration,
    /// Retry policy; a job's `max_attempts` overrides the attempt budget.
    pub retry: RetryPolicy,
}

impl Default for InProcessQueueConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome<O> {
    /// `execute_job` succeeded and the completion hook ran.
    Completed(O),
    /// The final attempt failed, or the completion hook did.
    Failed(ErrorEnvelope),
    /// The final attempt exceeded its deadline.
    TimedOut,
}

/// Handle to one accepted job.
#[derive(Debug)]
pub struct JobHandle<O> {
    job_id: JobId,
    receiver: oneshot::Receiver<JobOutcome<O>>,
}

impl<O> JobHandle<O> {
    /// Id assigned at enqueue.
    #[must_use]
    pub const fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<JobOutcome<O>> {
        self.receiver.await.map_err(|_| shutdown_error())
    }
}

struct Queued<W: JobWorkerPort> {
    ctx: RequestContext,
    job: Job<W::Payload>,
    reply: oneshot::Sender<JobOutcome<W::Output>>,
}

/// Single-consumer in-memory queue.
pub struct InProcessQueue<W: JobWorkerPort> {
    worker: Arc<W>,
    logger: Option<Arc<dyn LoggerPort>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Queued<W>>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<W> InProcessQueue<W>
where
    W: JobWorkerPort + 'static,
    W::Output: Clone,
{
    /// Spawn the consumer on the current runtime.
    pub fn start(
        worker: Arc<W>,
        config: InProcessQueueConfig,
        logger: Option<Arc<dyn LoggerPort>>,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("no tokio runtime available for the queue: {error}"),
                ErrorClass::NonRetriable,
            )
        })?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let consumer = handle.spawn(consume(
            Arc::clone(&worker),
            config,
            logger.clone(),
            receiver,
        ));
        Ok(Self {
            worker,
            logger,
            sender: Mutex::new(Some(sender)),
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Run the enqueue hook and, if it accepts, queue the job.
    pub async fn enqueue(
        &self,
        ctx: &RequestContext,
        payload: W::Payload,
        options: JobOptions,
    ) -> Result<JobHandle<W::Output>> {
        let job = Job::new(payload, options);
        let queue = self.worker.queue_name();

        if let Err(error) = self.worker.on_job_enqueued(ctx, &job).await {
            self.log_debug("queue.job.rejected", "Job rejected at enqueue", queue, &job.id);
            return Err(error);
        }

        let (reply, receiver) = oneshot::channel();
        let job_id = job.id.clone();
        let sender = lock(&self.sender).clone().ok_or_else(shutdown_error)?;
        sender
            .send(Queued {
                ctx: ctx.clone(),
                job,
                reply,
            })
            .map_err(|_| shutdown_error())?;

        self.log_debug("queue.job.enqueued", "Job accepted", queue, &job_id);
        Ok(JobHandle { job_id, receiver })
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub async fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let consumer = lock(&self.consumer).take();
        if let Some(consumer) = consumer
            && let Err(error) = consumer.await
        {
            tracing::warn!(%error, "queue consumer did not finish cleanly");
        }
        if let Some(logger) = self.logger.as_ref() {
            logger.debug("queue.shutdown", "Queue drained", Some(queue_fields(self.worker.queue_name(), None)));
        }
    }

    fn log_debug(&self, event: &str, message: &str, queue: &str, job_id: &JobId) {
        if let Some(logger) = self.logger.as_ref() {
            logger.debug(event, message, Some(queue_fields(queue, Some(job_id))));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn consume<W>(
    worker: Arc<W>,
    config: InProcessQueueConfig,
    logger: Option<Arc<dyn LoggerPort>>,
    mut receiver: mpsc::UnboundedReceiver<Queued<W>>,
) where
    W: JobWorkerPort + 'static,
    W::Output: Clone,
{
    while let Some(queued) = receiver.recv().await {
        let outcome = run_job(worker.as_ref(), config, logger.as_deref(), &queued.ctx, &queued.job).await;
        // The submitter may have stopped waiting.
        let _ = queued.reply.send(outcome);
    }
}

async fn run_job<W>(
    worker: &W,
    config: InProcessQueueConfig,
    logger: Option<&dyn LoggerPort>,
    ctx: &RequestContext,
    job: &Job<W::Payload>,
) -> JobOutcome<W::Output>
where
    W: JobWorkerPort,
    W::Output: Clone,
{
    let queue = worker.queue_name();
    let deadline = job.timeout_or(config.default_timeout);
    let policy = RetryPolicy {
        max_attempts: job
            .options
            .max_attempts
            .unwrap_or(config.retry.max_attempts)
            .max(1),
        ..config.retry
    };

    let mut attempt = move |attempt: u32| async move {
        if let Some(logger) = logger {
            let mut fields = queue_fields(queue, Some(&job.id));
            fields.insert("attempt".into(), Value::from(attempt));
            logger.debug("queue.job.attempt", "Executing job", Some(fields));
        }
        tokio::time::timeout(deadline, worker.execute_job(ctx, job))
            .await
            .unwrap_or_else(|_| Err(deadline_error(deadline)))
    };
    let result = retry_async_with_observer(ctx, policy, "queue.execute", &mut attempt, |attempt, error| {
        if let Some(logger) = logger {
            let mut fields = queue_fields(queue, Some(&job.id));
            fields.insert("attempt".into(), Value::from(attempt));
            fields.insert("errorCode".into(), Value::from(error.code.to_string()));
            logger.warn("queue.job.retry", "Job attempt failed; retrying", Some(fields));
        }
    })
    .await;

    match result {
        Ok(output) => match worker.on_job_completed(ctx, job, output.clone()).await {
            Ok(()) => JobOutcome::Completed(output),
            Err(error) => {
                log_hook_failure(logger, queue, &job.id, "completed", &error);
                JobOutcome::Failed(error)
            },
        },
        Err(error) if error.is_timeout() => {
            if let Err(hook_error) = worker.on_job_timeout(ctx, job).await {
                log_hook_failure(logger, queue, &job.id, "timeout", &hook_error);
            }
            JobOutcome::TimedOut
        },
        Err(error) => {
            if let Err(hook_error) = worker.on_job_execution_error(ctx, job, &error).await {
                log_hook_failure(logger, queue, &job.id, "executionError", &hook_error);
            }
            JobOutcome::Failed(error)
        },
    }
}

fn deadline_error(deadline: Duration) -> ErrorEnvelope {
    ErrorEnvelope::expected_with_class(
        ErrorCode::timeout(),
        format!("job exceeded its {}ms deadline", deadline.as_millis()),
        ErrorClass::Retriable,
    )
}

fn shutdown_error() -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::new("queue", "shutdown"), "queue is shut down")
}

fn queue_fields(queue: &str, job_id: Option<&JobId>) -> LogFields {
    let mut fields = LogFields::new();
    fields.insert("queue".into(), Value::from(queue));
    if let Some(job_id) = job_id {
        fields.insert("jobId".into(), Value::from(job_id.as_str()));
    }
    fields
}

fn log_hook_failure(
    logger: Option<&dyn LoggerPort>,
    queue: &str,
    job_id: &JobId,
    hook: &str,
    error: &ErrorEnvelope,
) {
    if let Some(logger) = logger {
        let mut fields = queue_fields(queue, Some(job_id));
        fields.insert("hook".into(), Value::from(hook));
        fields.insert("errorCode".into(), Value::from(error.code.to_string()));
        fields.insert("errorMessage".into(), Value::from(error.message.as_str()));
        logger.error("queue.job.hookFailed", "Job hook failed", Some(fields));
    }
}
