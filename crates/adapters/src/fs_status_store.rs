//! Filesystem status store: one JSON document per repository.
//!
//! Layout: `<root>/<host>/<owner>/<name>.json`. Documents are replaced
//! atomically (write to a sibling temp file, then rename) and every write goes
//! through a store-wide lock, so concurrent patches to one repository apply
//! in call order.

use clone_pipeline_domain::{RepositoryRecord, RepositoryUri};
use clone_pipeline_ports::{BoxFuture, StatusPatch, StatusStorePort};
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// JSON-file backed [`StatusStorePort`].
#[derive(Debug)]
pub struct FsStatusStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsStatusStore {
    /// Store documents under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Document path for `uri`.
    #[must_use]
    pub fn document_path(&self, uri: &RepositoryUri) -> PathBuf {
        let path = uri
            .segments()
            .fold(self.root.clone(), |path, segment| path.join(segment));
        // Repository names may contain dots, so the suffix is appended rather than swapped in.
        let mut document = path.into_os_string();
        document.push(".json");
        PathBuf::from(document)
    }

    async fn read(&self, uri: &RepositoryUri) -> Result<Option<RepositoryRecord>> {
        let path = self.document_path(uri);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(store_error("read_failed", &path, &error)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|error| {
                ErrorEnvelope::invariant(
                    ErrorCode::new("status", "corrupt_document"),
                    format!("status document is not valid: {error}"),
                )
                .with_metadata("path", path.display().to_string())
            })
    }

    async fn write(&self, record: &RepositoryRecord) -> Result<()> {
        let path = self.document_path(&record.uri);
        let payload = serde_json::to_vec_pretty(record).map_err(|error| {
            ErrorEnvelope::invariant(
                ErrorCode::new("status", "serialize_failed"),
                format!("failed to serialize status document: {error}"),
            )
        })?;
        write_atomic(&path, &payload)
            .await
            .map_err(|error| store_error("write_failed", &path, &error))
    }
}

async fn write_atomic(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, payload).await?;
    if let Err(error) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error);
    }
    Ok(())
}

fn store_error(code: &'static str, path: &Path, error: &std::io::Error) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("status", code),
        format!("status store I/O failed: {error}"),
        ErrorClass::Retriable,
    )
    .with_metadata("path", path.display().to_string())
}

impl StatusStorePort for FsStatusStore {
    fn index<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: RepositoryRecord,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("status_store.index")?;
            let _guard = self.write_lock.lock().await;
            self.write(&record).await
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
        patch: StatusPatch,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("status_store.update")?;
            let _guard = self.write_lock.lock().await;
            let mut record = self.read(uri).await?.ok_or_else(|| {
                ErrorEnvelope::expected(ErrorCode::not_found(), "status record not found")
                    .with_metadata("uri", uri.as_str())
                    .with_metadata("patch", patch.kind())
            })?;
            patch.apply_to(&mut record);
            self.write(&record).await
        })
    }

    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
    ) -> BoxFuture<'a, Result<Option<RepositoryRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("status_store.get")?;
            self.read(uri).await
        })
    }
}
