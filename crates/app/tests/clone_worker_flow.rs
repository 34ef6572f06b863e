//! End-to-end behavior of the clone worker hooks against in-memory doubles.

use clone_pipeline_app::{
    CancellationRegistry, CloneJobResult, CloneWorker, CloneWorkerDeps, CloneWorkerSettings,
    WatermarkAdmission, WatermarkAdmissionConfig, WatermarkAdmissionDeps,
};
use clone_pipeline_domain::{
    CancellationReason, CloneJobPayload, ClonePhase, GitUrl, GitUrlPolicy, Job, JobKey,
    JobOptions, PROGRESS_COMPLETED, PROGRESS_INIT, RepositoryUri,
};
use clone_pipeline_ports::{JobWorkerPort, StatusPatch};
use clone_pipeline_shared::{CancellationToken, ErrorCode, ErrorEnvelope, RequestContext};
use clone_pipeline_testkit::errors::{cancelled_error, status_write_error, transfer_error};
use clone_pipeline_testkit::{
    CloneScript, CountingWatermark, ManualScheduler, RecordingIndexQueue, RecordingLogger,
    RecordingStatusStore, RecordingTelemetry, ScriptedDiskProbe, ScriptedRepositoryServiceFactory,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

type TestResult = Result<(), Box<dyn Error>>;

const URL: &str = "https://github.com/acme/widgets.git";

struct Harness {
    worker: CloneWorker,
    store: Arc<RecordingStatusStore>,
    watermark: Arc<CountingWatermark>,
    factory: ScriptedRepositoryServiceFactory,
    index_queue: Arc<RecordingIndexQueue>,
    scheduler: Arc<ManualScheduler>,
    registry: Arc<CancellationRegistry>,
    logger: Arc<RecordingLogger>,
    telemetry: Arc<RecordingTelemetry>,
}

impl Harness {
    fn new(factory: ScriptedRepositoryServiceFactory) -> Self {
        Self::with_watermark(factory, CountingWatermark::new(false))
    }

    fn with_watermark(
        factory: ScriptedRepositoryServiceFactory,
        watermark: CountingWatermark,
    ) -> Self {
        let store = Arc::new(RecordingStatusStore::new());
        let watermark = Arc::new(watermark);
        let index_queue = Arc::new(RecordingIndexQueue::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let registry = Arc::new(CancellationRegistry::new());
        let logger = Arc::new(RecordingLogger::new());
        let telemetry = Arc::new(RecordingTelemetry::new());

        let mut settings = CloneWorkerSettings::new("/repos");
        settings.progress_interval = Duration::ZERO;

        let worker = CloneWorker::new(
            CloneWorkerDeps {
                status_store: store.clone(),
                watermark: watermark.clone(),
                repository_factory: Arc::new(factory.clone()),
                index_queue: index_queue.clone(),
                scheduler: scheduler.clone(),
                registry: Arc::clone(&registry),
                logger: Some(logger.clone()),
                telemetry: Some(telemetry.clone()),
            },
            settings,
        );

        Self {
            worker,
            store,
            watermark,
            factory,
            index_queue,
            scheduler,
            registry,
            logger,
            telemetry,
        }
    }
}

fn job(url: &str) -> Job<CloneJobPayload> {
    Job::new(CloneJobPayload::new(url), JobOptions::default())
}

fn widgets() -> Result<RepositoryUri, Box<dyn Error>> {
    Ok(GitUrl::parse(URL, &GitUrlPolicy::permissive())?.uri().clone())
}

fn progress_values(patches: &[StatusPatch]) -> Vec<u8> {
    patches
        .iter()
        .filter_map(|patch| match patch {
            StatusPatch::CloneStatus(status) if status.phase == Some(ClonePhase::Cloning) => {
                status.progress
            },
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn enqueue_creates_one_queued_record() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();

    harness.worker.on_job_enqueued(&ctx, &job(URL)).await?;

    assert_eq!(harness.store.index_count(), 1);
    assert!(harness.store.patches().is_empty());
    let record = harness.store.record(&widgets()?).ok_or("record missing")?;
    assert_eq!(record.clone_status.progress, PROGRESS_INIT);
    assert_eq!(record.clone_status.phase, ClonePhase::Queued);
    assert_eq!(harness.telemetry.counter("clone.enqueued"), 1);
    Ok(())
}

#[tokio::test]
async fn enqueue_rejects_invalid_url_without_writes() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();

    let result = harness.worker.on_job_enqueued(&ctx, &job("/foo/bar.git")).await;

    assert!(result.is_err());
    assert!(harness.store.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn enqueue_record_survives_admission_rejection() -> TestResult {
    let harness = Harness::with_watermark(
        ScriptedRepositoryServiceFactory::new(CloneScript::succeed()),
        CountingWatermark::new(true),
    );
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let error = harness.worker.execute_job(&ctx, &job).await.err().ok_or("expected rejection")?;
    harness.worker.on_job_execution_error(&ctx, &job, &error).await?;

    assert_eq!(harness.store.index_count(), 1);
    Ok(())
}

#[tokio::test]
async fn low_watermark_rejects_before_any_service_exists() -> TestResult {
    let harness = Harness::with_watermark(
        ScriptedRepositoryServiceFactory::new(CloneScript::succeed()),
        CountingWatermark::new(true).with_label("90%"),
    );
    let ctx = RequestContext::new_request();

    let error = harness
        .worker
        .execute_job(&ctx, &job(URL))
        .await
        .err()
        .ok_or("expected admission rejection")?;

    assert_eq!(error.code, ErrorCode::new("clone", "admission_rejected"));
    assert_eq!(error.metadata.get("threshold").map(String::as_str), Some("90%"));
    assert_eq!(harness.watermark.calls(), 1);
    assert_eq!(harness.factory.instances(), 0);
    assert_eq!(harness.telemetry.counter("clone.admission.rejected"), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_url_returns_empty_result_without_probe_or_service() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();

    for url in ["file:///foo/bar.git", "/foo/bar.git"] {
        let result = harness.worker.execute_job(&ctx, &job(url)).await?;
        assert_eq!(result, CloneJobResult::skipped());
    }

    assert_eq!(harness.watermark.calls(), 0);
    assert_eq!(harness.factory.instances(), 0);
    Ok(())
}

#[tokio::test]
async fn completion_writes_three_updates_then_indexes_after_debounce() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let result = harness.worker.execute_job(&ctx, &job).await?;
    let repository = result.repository.clone().ok_or("expected a cloned repository")?;
    assert_eq!(
        repository.path,
        std::path::Path::new("/repos/github.com/acme/widgets")
    );
    harness.worker.on_job_completed(&ctx, &job, result).await?;

    let patches = harness.store.patches();
    assert_eq!(patches.len(), 3);
    assert!(matches!(
        patches.first(),
        Some(StatusPatch::Repository(patch))
            if patch.default_branch.as_deref() == Some("main")
                && patch.head_revision.as_deref() == Some(&*repository.head_revision)
    ));
    assert!(matches!(
        patches.get(1),
        Some(StatusPatch::CloneStatus(patch))
            if patch.revision.as_deref() == Some(&*repository.head_revision)
    ));
    assert!(matches!(
        patches.get(2),
        Some(StatusPatch::CloneStatus(patch))
            if patch.progress == Some(PROGRESS_COMPLETED) && patch.phase == Some(ClonePhase::Cloned)
    ));

    assert!(harness.index_queue.jobs().is_empty());
    assert_eq!(harness.scheduler.scheduled_delays(), vec![Duration::from_secs(1)]);
    assert_eq!(harness.scheduler.advance(Duration::from_millis(999)).await, 0);
    assert!(harness.index_queue.jobs().is_empty());
    assert_eq!(harness.scheduler.advance(Duration::from_millis(1)).await, 1);

    let payloads = harness.index_queue.payloads();
    assert_eq!(payloads.len(), 1);
    let payload = payloads.first().ok_or("index job missing")?;
    assert_eq!(payload.uri, widgets()?);
    assert_eq!(&*payload.revision, "main");
    assert_eq!(harness.telemetry.counter("clone.index.enqueued"), 1);

    let record = harness.store.record(&widgets()?).ok_or("record missing")?;
    assert!(record.is_settled());
    Ok(())
}

#[tokio::test]
async fn cancelled_completion_writes_nothing_and_never_indexes() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();

    harness
        .worker
        .on_job_completed(
            &ctx,
            &job(URL),
            CloneJobResult::cancelled(Some(CancellationReason::UserCancel)),
        )
        .await?;

    assert!(harness.store.calls().is_empty());
    assert_eq!(harness.scheduler.pending(), 0);
    harness.scheduler.advance(Duration::from_secs(60)).await;
    assert!(harness.index_queue.jobs().is_empty());
    assert!(harness.logger.has_event("clone.completed.cancelled"));
    Ok(())
}

#[tokio::test]
async fn completion_is_not_deduplicated() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let result = harness.worker.execute_job(&ctx, &job).await?;
    harness.worker.on_job_completed(&ctx, &job, result.clone()).await?;
    harness.worker.on_job_completed(&ctx, &job, result).await?;

    assert_eq!(harness.store.patches().len(), 6);
    harness.scheduler.advance(Duration::from_secs(1)).await;
    assert_eq!(harness.index_queue.jobs().len(), 2);
    Ok(())
}

#[tokio::test]
async fn progress_samples_are_forwarded_once_per_percentage() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(
        CloneScript::succeed().with_progress(&[10, 40, 40, 90]),
    ));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let result = harness.worker.execute_job(&ctx, &job).await?;

    assert!(result.repository.is_some());
    assert_eq!(progress_values(&harness.store.patches()), vec![10, 40, 90]);
    Ok(())
}

#[tokio::test]
async fn progress_write_failure_fails_the_job() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(
        CloneScript::wait_for_cancel().with_progress(&[25]),
    ));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    harness.store.fail_writes(true);
    let error = tokio::time::timeout(
        Duration::from_secs(5),
        harness.worker.execute_job(&ctx, &job),
    )
    .await?
    .err()
    .ok_or("expected the status write failure")?;

    assert_eq!(error.code, status_write_error().code);
    assert!(harness.logger.has_event("clone.progress.writeFailed"));
    assert_eq!(harness.telemetry.counter("clone.execute.failed"), 1);
    assert!(harness.registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_watermark_check_propagates_without_a_service() -> TestResult {
    let harness = Harness::with_watermark(
        ScriptedRepositoryServiceFactory::new(CloneScript::succeed()),
        CountingWatermark::failing(status_write_error()),
    );
    let ctx = RequestContext::new_request();

    let error = harness
        .worker
        .execute_job(&ctx, &job(URL))
        .await
        .err()
        .ok_or("expected the watermark failure")?;

    assert_eq!(error.code, status_write_error().code);
    assert_eq!(harness.watermark.calls(), 1);
    assert_eq!(harness.factory.instances(), 0);
    Ok(())
}

#[tokio::test]
async fn probe_failure_is_not_silently_admitted() -> TestResult {
    let probe = Arc::new(ScriptedDiskProbe::failing(ErrorEnvelope::from(
        std::io::Error::other("statvfs failed"),
    )));
    let admission = WatermarkAdmission::new(
        WatermarkAdmissionDeps {
            probe: probe.clone(),
            logger: None,
            telemetry: None,
        },
        WatermarkAdmissionConfig {
            enabled: true,
            threshold: "80%".parse()?,
            path: "/repos".into(),
        },
    );
    let factory = ScriptedRepositoryServiceFactory::new(CloneScript::succeed());
    let store = Arc::new(RecordingStatusStore::new());
    let worker = CloneWorker::new(
        CloneWorkerDeps {
            status_store: store.clone(),
            watermark: Arc::new(admission),
            repository_factory: Arc::new(factory.clone()),
            index_queue: Arc::new(RecordingIndexQueue::new()),
            scheduler: Arc::new(ManualScheduler::new()),
            registry: Arc::new(CancellationRegistry::new()),
            logger: None,
            telemetry: None,
        },
        CloneWorkerSettings::new("/repos"),
    );

    let error = worker
        .execute_job(&RequestContext::new_request(), &job(URL))
        .await
        .err()
        .ok_or("expected the probe failure")?;

    assert_eq!(error.code, ErrorCode::new("clone", "admission_probe_failed"));
    assert_eq!(probe.calls(), 1);
    assert_eq!(factory.instances(), 0);
    assert!(store.patches().is_empty());
    Ok(())
}

#[tokio::test]
async fn registry_cancel_yields_cancelled_result() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(
        CloneScript::wait_for_cancel().with_progress(&[5]),
    ));
    let ctx = RequestContext::new_request();
    let job = job(URL);
    let key = JobKey::clone_job(widgets()?);

    let (result, signalled) = tokio::join!(harness.worker.execute_job(&ctx, &job), async {
        harness.factory.started().await;
        harness.registry.cancel(&key, CancellationReason::UserCancel)
    });

    let result = result?;
    assert!(signalled);
    assert!(result.cancelled);
    assert_eq!(result.cancellation_reason, Some(CancellationReason::UserCancel));
    assert!(result.repository.is_none());
    assert!(harness.registry.is_empty());
    assert_eq!(harness.telemetry.counter("clone.execute.aborted"), 1);
    Ok(())
}

#[tokio::test]
async fn queue_context_cancel_reaches_the_running_clone() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(
        CloneScript::wait_for_cancel(),
    ));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    let (result, ()) = tokio::join!(harness.worker.execute_job(&ctx, &job), async {
        harness.factory.started().await;
        ctx.cancel();
    });

    let result = result?;
    assert!(result.cancelled);
    assert_eq!(result.cancellation_reason, Some(CancellationReason::UserCancel));
    Ok(())
}

#[tokio::test]
async fn newer_job_overrides_in_flight_clone_of_same_repository() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::with_sequence(
        vec![CloneScript::wait_for_cancel()],
        CloneScript::succeed(),
    ));
    let ctx = RequestContext::new_request();
    let first = job(URL);
    let second = job(URL);

    let (older, newer) = tokio::join!(harness.worker.execute_job(&ctx, &first), async {
        harness.factory.started().await;
        harness.worker.execute_job(&ctx, &second).await
    });

    let older = older?;
    assert!(older.cancelled);
    assert_eq!(older.cancellation_reason, Some(CancellationReason::NewJobOverridden));
    assert!(newer?.repository.is_some());
    assert_eq!(harness.factory.instances(), 2);
    assert!(harness.registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn newer_job_waits_until_the_older_clone_releases_the_key() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();
    let older_token = CancellationToken::new();
    let older = harness
        .registry
        .register_scoped(JobKey::clone_job(widgets()?), older_token.clone());

    let job = job(URL);
    let newer = harness.worker.execute_job(&ctx, &job);
    tokio::pin!(newer);
    let still_waiting = tokio::time::timeout(Duration::from_millis(50), &mut newer).await;

    assert!(still_waiting.is_err());
    assert_eq!(older_token.reason(), Some("new_job_overridden"));
    assert_eq!(harness.factory.instances(), 0);

    drop(older);
    let result = newer.await?;
    assert!(result.repository.is_some());
    assert_eq!(harness.factory.instances(), 1);
    Ok(())
}

#[tokio::test]
async fn execution_error_marks_record_failed() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::fail(
        transfer_error(),
    )));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let error = harness.worker.execute_job(&ctx, &job).await.err().ok_or("expected failure")?;
    assert_eq!(error, transfer_error());
    harness.worker.on_job_execution_error(&ctx, &job, &error).await?;

    let record = harness.store.record(&widgets()?).ok_or("record missing")?;
    assert_eq!(record.clone_status.phase, ClonePhase::Failed);
    assert_eq!(
        record.clone_status.error_message.as_deref(),
        Some(transfer_error().message.as_str())
    );
    assert_eq!(harness.telemetry.counter("clone.execute.failed"), 1);
    assert!(harness.registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn execution_error_skips_cancellation() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();

    harness
        .worker
        .on_job_execution_error(&ctx, &job(URL), &cancelled_error())
        .await?;

    assert!(harness.store.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn timeout_marks_record_timed_out() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    harness.worker.on_job_timeout(&ctx, &job).await?;

    let record = harness.store.record(&widgets()?).ok_or("record missing")?;
    assert_eq!(record.clone_status.phase, ClonePhase::TimedOut);
    Ok(())
}

#[tokio::test]
async fn completion_surfaces_status_store_failures() -> TestResult {
    let harness = Harness::new(ScriptedRepositoryServiceFactory::new(CloneScript::succeed()));
    let ctx = RequestContext::new_request();
    let job = job(URL);

    harness.worker.on_job_enqueued(&ctx, &job).await?;
    let result = harness.worker.execute_job(&ctx, &job).await?;
    harness.store.fail_writes(true);
    let error = harness
        .worker
        .on_job_completed(&ctx, &job, result)
        .await
        .err()
        .ok_or("expected store failure")?;

    assert_eq!(error, status_write_error());
    assert_eq!(harness.scheduler.pending(), 0);
    Ok(())
}
