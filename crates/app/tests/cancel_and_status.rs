//! Cancel and status use cases.

use clone_pipeline_app::{
    CancelCloneDeps, CancellationRegistry, ReadStatusDeps, cancel_clone, read_repository_status,
};
use clone_pipeline_domain::{
    CancellationReason, GitUrlPolicy, JobKey, RepositoryRecord, RepositoryUri,
};
use clone_pipeline_ports::StatusPatch;
use clone_pipeline_shared::{CancellationToken, ErrorCode, RequestContext};
use clone_pipeline_testkit::{RecordingLogger, RecordingStatusStore};
use std::error::Error;
use std::sync::Arc;

type TestResult = Result<(), Box<dyn Error>>;

fn widgets() -> Result<RepositoryUri, Box<dyn Error>> {
    Ok(RepositoryUri::parse("github.com/acme/widgets")?)
}

fn deps(
    registry: &Arc<CancellationRegistry>,
    store: &Arc<RecordingStatusStore>,
) -> CancelCloneDeps {
    CancelCloneDeps {
        registry: Arc::clone(registry),
        status_store: store.clone(),
        logger: Some(Arc::new(RecordingLogger::new())),
    }
}

#[tokio::test]
async fn cancel_marks_record_only_when_a_job_was_signalled() -> TestResult {
    let registry = Arc::new(CancellationRegistry::new());
    let store = Arc::new(RecordingStatusStore::new());
    let ctx = RequestContext::new_request();
    let uri = widgets()?;
    store.seed(RepositoryRecord::queued(uri.clone(), None, 1));

    assert!(!cancel_clone(&ctx, &deps(&registry, &store), &uri, CancellationReason::UserCancel).await?);
    assert!(store.calls().is_empty());

    let token = CancellationToken::new();
    let _guard = registry.register_scoped(JobKey::clone_job(uri.clone()), token.clone());
    assert!(cancel_clone(&ctx, &deps(&registry, &store), &uri, CancellationReason::UserCancel).await?);

    assert!(token.is_cancelled());
    assert!(matches!(
        store.patches().as_slice(),
        [StatusPatch::Repository(patch)] if patch.cancelled == Some(true)
    ));
    assert!(store.record(&uri).ok_or("record missing")?.cancelled);
    Ok(())
}

#[tokio::test]
async fn read_status_returns_record_or_not_found() -> TestResult {
    let store = Arc::new(RecordingStatusStore::new());
    let deps = ReadStatusDeps {
        status_store: store.clone(),
    };
    let ctx = RequestContext::new_request();
    let policy = GitUrlPolicy::permissive();
    let url = "git@github.com:acme/widgets.git";

    let error = read_repository_status(&ctx, &deps, url, &policy)
        .await
        .err()
        .ok_or("expected not found")?;
    assert_eq!(error.code, ErrorCode::not_found());

    store.seed(RepositoryRecord::queued(widgets()?, None, 7));
    let record = read_repository_status(&ctx, &deps, url, &policy).await?;
    assert_eq!(record.uri, widgets()?);
    Ok(())
}
