//! Append-only JSONL file acting as the downstream index queue.
//!
//! Each enqueued job is one line. Appends take an exclusive advisory lock on
//! the file so several clone processes can share one queue file.

use clone_pipeline_domain::{IndexJobPayload, Job};
use clone_pipeline_ports::{BoxFuture, IndexQueuePort};
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// [`IndexQueuePort`] writing to a JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlIndexQueue {
    path: PathBuf,
}

impl JsonlIndexQueue {
    /// Queue backed by `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Queue file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every job currently in the file.
    pub async fn read_all(&self) -> Result<Vec<Job<IndexJobPayload>>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_jobs(&path))
            .await
            .map_err(join_error)?
    }
}

fn append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let written = file.write_all(line).and_then(|()| file.flush());
    let unlocked = FileExt::unlock(&file);
    written.and(unlocked)
}

fn read_jobs(path: &Path) -> Result<Vec<Job<IndexJobPayload>>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(queue_io_error(path, &error)),
    };
    FileExt::lock_shared(&file).map_err(|error| queue_io_error(path, &error))?;
    let mut jobs = Vec::new();
    for (number, line) in BufReader::new(&file).lines().enumerate() {
        let line = line.map_err(|error| queue_io_error(path, &error))?;
        if line.trim().is_empty() {
            continue;
        }
        let job = serde_json::from_str(&line).map_err(|error| {
            ErrorEnvelope::invariant(
                ErrorCode::new("queue", "corrupt_entry"),
                format!("index queue entry is not valid: {error}"),
            )
            .with_metadata("path", path.display().to_string())
            .with_metadata("line", (number + 1).to_string())
        })?;
        jobs.push(job);
    }
    let _ = FileExt::unlock(&file);
    Ok(jobs)
}

fn queue_io_error(path: &Path, error: &std::io::Error) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("queue", "io_failed"),
        format!("index queue I/O failed: {error}"),
        ErrorClass::Retriable,
    )
    .with_metadata("path", path.display().to_string())
}

fn join_error(error: tokio::task::JoinError) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::internal(),
        format!("index queue task failed: {error}"),
        ErrorClass::NonRetriable,
    )
}

impl IndexQueuePort for JsonlIndexQueue {
    fn enqueue_index_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: Job<IndexJobPayload>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("index_queue.enqueue")?;
            let mut line = serde_json::to_vec(&job).map_err(|error| {
                ErrorEnvelope::invariant(
                    ErrorCode::new("queue", "serialize_failed"),
                    format!("failed to serialize index job: {error}"),
                )
            })?;
            line.push(b'\n');
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || {
                append_line(&path, &line).map_err(|error| queue_io_error(&path, &error))
            })
            .await
            .map_err(join_error)?
        })
    }
}
