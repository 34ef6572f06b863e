//! Repository service that shells out to the `git` command line.
//!
//! `git clone --progress` writes its progress meter to stderr, using carriage
//! returns between samples. The service parses that stream into
//! [`CloneProgressUpdate`]s: receiving objects maps onto 0-90% and resolving
//! deltas onto 90-99%. 100% is reserved for the worker's completion write.

use clone_pipeline_domain::{CloneObjectCounts, CloneProgressUpdate};
use clone_pipeline_ports::{
    BoxFuture, CloneOutcome, CloneProgressSink, CloneRequest, RepositoryServiceFactoryPort,
    RepositoryServicePort,
};
use clone_pipeline_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, redact_url_credentials,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

const RECEIVING_SHARE: u8 = 90;
const RESOLVING_CEILING: u8 = 99;
const STDERR_TAIL_LINES: usize = 20;

/// Factory producing [`GitCliRepositoryService`] instances.
#[derive(Debug, Clone)]
pub struct GitCliRepositoryServiceFactory {
    git_binary: PathBuf,
}

impl GitCliRepositoryServiceFactory {
    /// Use `git_binary` (a name on `PATH` or an absolute path).
    #[must_use]
    pub fn new(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }
}

impl RepositoryServiceFactoryPort for GitCliRepositoryServiceFactory {
    fn new_instance(&self, repo_root: &Path) -> Arc<dyn RepositoryServicePort> {
        Arc::new(GitCliRepositoryService {
            git_binary: self.git_binary.clone(),
            repo_root: repo_root.to_path_buf(),
        })
    }
}

/// Clones with the git CLI.
#[derive(Debug, Clone)]
pub struct GitCliRepositoryService {
    git_binary: PathBuf,
    repo_root: PathBuf,
}

impl GitCliRepositoryService {
    /// Root directory this instance clones under.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn clone_command(&self, request: &CloneRequest) -> Command {
        let mut command = Command::new(&self.git_binary);
        command
            .arg("clone")
            .arg("--progress")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(branch) = request.options.branch.as_deref() {
            command.arg("--branch").arg(branch);
        }
        if let Some(depth) = request.options.depth {
            command.arg("--depth").arg(depth.to_string());
        }
        command.arg("--").arg(request.url.as_str()).arg(&request.target);
        command
    }

    async fn run_clone(
        &self,
        ctx: &RequestContext,
        request: &CloneRequest,
        progress: &dyn CloneProgressSink,
    ) -> Result<()> {
        prepare_target(&request.target).await?;

        let mut child = self
            .clone_command(request)
            .spawn()
            .map_err(|error| self.spawn_error(&error))?;
        let stderr = child.stderr.take();

        let transfer = async { tokio::join!(child.wait(), read_progress(stderr, progress)) };

        let finished = tokio::select! {
            biased;
            () = ctx.cancelled() => None,
            finished = transfer => Some(finished),
        };

        let Some((status, tail)) = finished else {
            terminate(&mut child).await;
            remove_target(&request.target).await;
            return Err(ErrorEnvelope::cancelled("git clone cancelled")
                .with_metadata("target", request.target.display().to_string()));
        };

        let status = status.map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::new("git", "wait_failed"),
                format!("failed to wait for git: {error}"),
                ErrorClass::Retriable,
            )
        })?;
        if status.success() {
            return Ok(());
        }

        remove_target(&request.target).await;
        Err(classify_failure(status, &tail))
    }

    async fn describe_checkout(&self, request: &CloneRequest) -> Result<CloneOutcome> {
        let head_revision = self
            .git_output(&request.target, &["rev-parse", "HEAD"])
            .await?;
        let default_branch = match request.options.branch.as_deref() {
            Some(branch) => branch.to_owned(),
            None => {
                self.git_output(&request.target, &["symbolic-ref", "--short", "HEAD"])
                    .await?
            },
        };
        Ok(CloneOutcome {
            default_branch: default_branch.into_boxed_str(),
            head_revision: head_revision.into_boxed_str(),
            path: request.target.clone(),
        })
    }

    async fn git_output(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.git_binary)
            .arg("-C")
            .arg(repo)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| self.spawn_error(&error))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ErrorEnvelope::unexpected(
                ErrorCode::new("git", "inspect_failed"),
                format!("git {} failed: {}", args.join(" "), stderr.trim()),
                ErrorClass::NonRetriable,
            )
            .with_metadata("path", repo.display().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn spawn_error(&self, error: &std::io::Error) -> ErrorEnvelope {
        ErrorEnvelope::unexpected(
            ErrorCode::new("git", "spawn_failed"),
            format!("failed to run git: {error}"),
            ErrorClass::NonRetriable,
        )
        .with_metadata("binary", self.git_binary.display().to_string())
    }
}

impl RepositoryServicePort for GitCliRepositoryService {
    fn clone_repository<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: CloneRequest,
        progress: Arc<dyn CloneProgressSink>,
    ) -> BoxFuture<'a, Result<CloneOutcome>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("git.clone")?;
            let checkout = PartialCheckout::new(&request.target);
            self.run_clone(ctx, &request, progress.as_ref()).await?;
            let outcome = self.describe_checkout(&request).await?;
            checkout.keep();
            Ok(outcome)
        })
    }
}

async fn prepare_target(target: &Path) -> Result<()> {
    // A previous attempt may have left a partial checkout behind.
    remove_target(target).await;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::io(),
                format!("failed to create clone directory: {error}"),
                ErrorClass::Retriable,
            )
            .with_metadata("path", parent.display().to_string())
        })?;
    }
    Ok(())
}

async fn remove_target(target: &Path) {
    if let Err(error) = tokio::fs::remove_dir_all(target).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %target.display(), %error, "failed to remove working copy");
    }
}

/// Removes a working copy that never finished, including when the clone
/// future is dropped mid-transfer (the queue deadline, a failed progress write).
#[derive(Debug)]
struct PartialCheckout {
    target: Option<PathBuf>,
}

impl PartialCheckout {
    fn new(target: &Path) -> Self {
        Self {
            target: Some(target.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.target = None;
    }
}

impl Drop for PartialCheckout {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };
        // Synchronous so the directory is gone before the job releases its key.
        if let Err(error) = std::fs::remove_dir_all(&target)
            && error.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %target.display(), %error, "failed to remove partial working copy");
        }
    }
}

async fn terminate(child: &mut Child) {
    if let Err(error) = child.kill().await {
        tracing::warn!(%error, "failed to stop git");
    }
}

/// Last lines git wrote to stderr, kept for error messages.
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    fn push(&mut self, line: &str) {
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_owned());
    }

    fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    fn last_meaningful(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.starts_with("fatal:") || line.starts_with("error:"))
            .or_else(|| self.lines.back())
            .map(String::as_str)
    }
}

async fn read_progress<R>(stream: Option<R>, progress: &dyn CloneProgressSink) -> StderrTail
where
    R: AsyncRead + Unpin,
{
    let mut tail = StderrTail::default();
    let Some(mut stream) = stream else {
        return tail;
    };
    let mut pending = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        for &byte in buffer.iter().take(read) {
            if byte == b'\r' || byte == b'\n' {
                flush_line(&mut pending, &mut tail, progress);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, &mut tail, progress);
    tail
}

fn flush_line(pending: &mut Vec<u8>, tail: &mut StderrTail, progress: &dyn CloneProgressSink) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).trim().to_owned();
    pending.clear();
    if line.is_empty() {
        return;
    }
    match parse_progress_line(&line) {
        Some(update) => progress.report(update),
        None => tail.push(&line),
    }
}

/// Parse one git progress line.
pub(crate) fn parse_progress_line(line: &str) -> Option<CloneProgressUpdate> {
    let line = line.strip_prefix("remote:").map_or(line, str::trim_start);
    if let Some(rest) = line.strip_prefix("Receiving objects:") {
        let (percent, counts) = parse_meter(rest)?;
        let objects = counts.map(|(received, total)| CloneObjectCounts {
            received_objects: received,
            total_objects: total,
            indexed_objects: 0,
        });
        return Some(CloneProgressUpdate {
            percentage: scale(percent, RECEIVING_SHARE),
            objects,
        });
    }
    if let Some(rest) = line.strip_prefix("Resolving deltas:") {
        let (percent, _) = parse_meter(rest)?;
        return Some(CloneProgressUpdate {
            percentage: (RECEIVING_SHARE + percent / 10).min(RESOLVING_CEILING),
            objects: None,
        });
    }
    None
}

fn scale(percent: u8, share: u8) -> u8 {
    u8::try_from(u16::from(percent) * u16::from(share) / 100).unwrap_or(share)
}

/// Parse `  45% (450/1000), 1.20 MiB | 1 MiB/s` into percent and counters.
fn parse_meter(rest: &str) -> Option<(u8, Option<(u64, u64)>)> {
    let rest = rest.trim_start();
    let (percent, rest) = rest.split_once('%')?;
    let percent: u8 = percent.trim().parse().ok()?;
    let counts = rest
        .trim_start()
        .strip_prefix('(')
        .and_then(|inner| inner.split_once(')'))
        .and_then(|(inner, _)| inner.split_once('/'))
        .and_then(|(done, total)| Some((done.trim().parse().ok()?, total.trim().parse().ok()?)));
    Some((percent.min(100), counts))
}

fn classify_failure(status: ExitStatus, tail: &StderrTail) -> ErrorEnvelope {
    let detail = tail
        .last_meaningful()
        .map_or_else(|| "no output".to_owned(), redact_words);
    let (code, class) = if tail.contains("Remote branch") && tail.contains("not found") {
        ("branch_not_found", ErrorClass::NonRetriable)
    } else if tail.contains("Repository not found")
        || tail.contains("does not appear to be a git repository")
        || (tail.contains("repository") && tail.contains("not found"))
    {
        ("repository_not_found", ErrorClass::NonRetriable)
    } else if tail.contains("Authentication failed")
        || tail.contains("could not read Username")
        || tail.contains("Permission denied")
    {
        ("auth_failed", ErrorClass::NonRetriable)
    } else {
        ("clone_failed", ErrorClass::Retriable)
    };

    let message = format!("git clone failed: {detail}");
    let envelope = if class.is_retriable() {
        ErrorEnvelope::unexpected(ErrorCode::new("git", code), message, class)
    } else {
        ErrorEnvelope::expected(ErrorCode::new("git", code), message)
    };
    match status.code() {
        Some(exit) => envelope.with_metadata("exitCode", exit.to_string()),
        None => envelope.with_metadata("exitCode", "signal"),
    }
}

fn redact_words(line: &str) -> String {
    line.split(' ')
        .map(|word| {
            if word.contains("://") {
                redact_url_credentials(word)
            } else {
                word.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
