//! Hook ordering, retry and deadline behaviour of the in-process queue.

use clone_pipeline_adapters::{InProcessQueue, InProcessQueueConfig, JobOutcome};
use clone_pipeline_domain::{Job, JobOptions};
use clone_pipeline_ports::{BoxFuture, JobWorkerPort, LoggerPort};
use clone_pipeline_shared::{
    ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy,
};
use clone_pipeline_testkit::RecordingLogger;
use clone_pipeline_testkit::errors::transfer_error;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type TestResult = std::result::Result<(), Box<dyn Error>>;

enum Step {
    Succeed(&'static str),
    Fail(ErrorEnvelope),
    Hang,
}

#[derive(Default)]
struct ScriptedWorker {
    steps: Mutex<VecDeque<Step>>,
    reject_enqueue: bool,
    events: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedWorker {
    fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    fn record(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .ok()
            .and_then(|mut steps| steps.pop_front())
            .unwrap_or(Step::Succeed("default"))
    }
}

impl JobWorkerPort for ScriptedWorker {
    type Payload = u32;
    type Output = String;

    fn queue_name(&self) -> &'static str {
        "scripted"
    }

    fn on_job_enqueued<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        job: &'a Job<u32>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(format!("enqueued:{}", job.payload));
            if self.reject_enqueue {
                return Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "rejected"));
            }
            Ok(())
        })
    }

    fn execute_job<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        job: &'a Job<u32>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.record(format!("execute:{}", job.payload));
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            let result = match self.next_step() {
                Step::Succeed(value) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(value.to_owned())
                },
                Step::Fail(error) => Err(error),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("late".to_owned())
                },
            };
            self.running.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn on_job_completed<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        job: &'a Job<u32>,
        output: String,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(format!("completed:{}:{output}", job.payload));
            Ok(())
        })
    }

    fn on_job_execution_error<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        job: &'a Job<u32>,
        error: &'a ErrorEnvelope,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(format!("error:{}:{}", job.payload, error.code));
            Ok(())
        })
    }

    fn on_job_timeout<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        job: &'a Job<u32>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(format!("timeout:{}", job.payload));
            Ok(())
        })
    }
}

fn config(max_attempts: u32) -> InProcessQueueConfig {
    InProcessQueueConfig {
        default_timeout: Duration::from_secs(60),
        retry: RetryPolicy {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ratio_pct: 0,
        },
    }
}

#[tokio::test]
async fn successful_job_runs_hooks_in_order() -> TestResult {
    let worker = Arc::new(ScriptedWorker::with_steps(vec![Step::Succeed("ok")]));
    let queue = InProcessQueue::start(Arc::clone(&worker), config(3), None)?;

    let handle = queue
        .enqueue(&RequestContext::new_request(), 7, JobOptions::default())
        .await?;
    assert!(!handle.job_id().as_str().is_empty());
    assert_eq!(handle.wait().await?, JobOutcome::Completed("ok".to_owned()));
    assert_eq!(worker.events(), ["enqueued:7", "execute:7", "completed:7:ok"]);
    Ok(())
}

#[tokio::test]
async fn rejected_enqueue_never_executes() -> TestResult {
    let worker = Arc::new(ScriptedWorker {
        reject_enqueue: true,
        ..ScriptedWorker::default()
    });
    let queue = InProcessQueue::start(Arc::clone(&worker), config(3), None)?;

    let error = queue
        .enqueue(&RequestContext::new_request(), 1, JobOptions::default())
        .await
        .err()
        .ok_or("expected rejection")?;
    assert_eq!(error.code, ErrorCode::invalid_input());
    queue.shutdown().await;
    assert_eq!(worker.events(), ["enqueued:1"]);
    Ok(())
}

#[tokio::test]
async fn retriable_failures_are_retried() -> TestResult {
    let worker = Arc::new(ScriptedWorker::with_steps(vec![
        Step::Fail(transfer_error()),
        Step::Succeed("second"),
    ]));
    let logger = Arc::new(RecordingLogger::new());
    let port: Arc<dyn LoggerPort> = logger.clone();
    let queue = InProcessQueue::start(Arc::clone(&worker), config(3), Some(port))?;

    let outcome = queue
        .enqueue(&RequestContext::new_request(), 2, JobOptions::default())
        .await?
        .wait()
        .await?;
    assert_eq!(outcome, JobOutcome::Completed("second".to_owned()));
    assert_eq!(
        worker.events(),
        ["enqueued:2", "execute:2", "execute:2", "completed:2:second"]
    );
    assert!(logger.has_event("queue.job.retry"));
    assert!(logger.has_event("queue.job.enqueued"));
    Ok(())
}

#[tokio::test]
async fn non_retriable_failure_calls_error_hook_once() -> TestResult {
    let fatal = ErrorEnvelope::expected(ErrorCode::new("git", "repository_not_found"), "gone");
    let worker = Arc::new(ScriptedWorker::with_steps(vec![Step::Fail(fatal.clone())]));
    let queue = InProcessQueue::start(Arc::clone(&worker), config(3), None)?;

    let outcome = queue
        .enqueue(&RequestContext::new_request(), 3, JobOptions::default())
        .await?
        .wait()
        .await?;
    assert_eq!(outcome, JobOutcome::Failed(fatal));
    assert_eq!(
        worker.events(),
        ["enqueued:3", "execute:3", "error:3:git:repository_not_found"]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deadline_exhausts_attempts_then_calls_timeout_hook() -> TestResult {
    let worker = Arc::new(ScriptedWorker::with_steps(vec![Step::Hang, Step::Hang]));
    let queue = InProcessQueue::start(Arc::clone(&worker), config(5), None)?;
    let options = JobOptions {
        timeout_ms: Some(50),
        max_attempts: Some(2),
    };

    let outcome = queue
        .enqueue(&RequestContext::new_request(), 4, options)
        .await?
        .wait()
        .await?;
    assert_eq!(outcome, JobOutcome::TimedOut);
    assert_eq!(
        worker.events(),
        ["enqueued:4", "execute:4", "execute:4", "timeout:4"]
    );
    Ok(())
}

#[tokio::test]
async fn jobs_execute_one_at_a_time_in_order() -> TestResult {
    let worker = Arc::new(ScriptedWorker::default());
    let queue = InProcessQueue::start(Arc::clone(&worker), config(1), None)?;
    let ctx = RequestContext::new_request();

    let first = queue.enqueue(&ctx, 1, JobOptions::default()).await?;
    let second = queue.enqueue(&ctx, 2, JobOptions::default()).await?;
    first.wait().await?;
    second.wait().await?;

    assert_eq!(worker.max_running.load(Ordering::SeqCst), 1);
    let executions: Vec<String> = worker
        .events()
        .into_iter()
        .filter(|event| event.starts_with("execute"))
        .collect();
    assert_eq!(executions, ["execute:1", "execute:2"]);
    Ok(())
}

#[tokio::test]
async fn enqueue_after_shutdown_fails() -> TestResult {
    let worker = Arc::new(ScriptedWorker::default());
    let queue = InProcessQueue::start(Arc::clone(&worker), config(1), None)?;
    queue.shutdown().await;

    let error = queue
        .enqueue(&RequestContext::new_request(), 9, JobOptions::default())
        .await
        .err()
        .ok_or("expected shutdown error")?;
    assert_eq!(error.code, ErrorCode::new("queue", "shutdown"));
    Ok(())
}
