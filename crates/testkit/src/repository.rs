//! Scripted repository service doubles.

use clone_pipeline_domain::CloneProgressUpdate;
use clone_pipeline_ports::{
    BoxFuture, CloneOutcome, CloneProgressSink, CloneRequest, RepositoryServiceFactoryPort,
    RepositoryServicePort,
};
use clone_pipeline_shared::{ErrorEnvelope, RequestContext, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// What a scripted clone does.
#[derive(Debug, Clone)]
pub enum CloneScript {
    /// Report `progress`, then succeed.
    Succeed {
        /// Branch reported by the clone.
        default_branch: Box<str>,
        /// Revision reported by the clone.
        head_revision: Box<str>,
        /// Samples reported before finishing.
        progress: Vec<CloneProgressUpdate>,
    },
    /// Report `progress`, then fail with the error.
    Fail {
        /// Returned error.
        error: ErrorEnvelope,
        /// Samples reported before failing.
        progress: Vec<CloneProgressUpdate>,
    },
    /// Report `progress`, then block until the context is cancelled.
    WaitForCancel {
        /// Samples reported before blocking.
        progress: Vec<CloneProgressUpdate>,
    },
}

impl CloneScript {
    /// Succeed on `main` at a fixed revision.
    pub fn succeed() -> Self {
        Self::Succeed {
            default_branch: "main".into(),
            head_revision: "4b825dc642cb6eb9a060e54bf8d69288fbee4904".into(),
            progress: Vec::new(),
        }
    }

    /// Fail with `error`.
    pub fn fail(error: ErrorEnvelope) -> Self {
        Self::Fail {
            error,
            progress: Vec::new(),
        }
    }

    /// Block until cancelled.
    pub fn wait_for_cancel() -> Self {
        Self::WaitForCancel {
            progress: Vec::new(),
        }
    }

    /// Report the given percentages before settling.
    #[must_use]
    pub fn with_progress(mut self, percentages: &[u8]) -> Self {
        let samples = percentages
            .iter()
            .map(|percentage| CloneProgressUpdate {
                percentage: *percentage,
                objects: None,
            })
            .collect();
        match &mut self {
            Self::Succeed { progress, .. }
            | Self::Fail { progress, .. }
            | Self::WaitForCancel { progress } => *progress = samples,
        }
        self
    }

    fn progress(&self) -> &[CloneProgressUpdate] {
        match self {
            Self::Succeed { progress, .. }
            | Self::Fail { progress, .. }
            | Self::WaitForCancel { progress } => progress,
        }
    }
}

#[derive(Debug)]
struct Shared {
    scripts: Mutex<VecDeque<CloneScript>>,
    fallback: CloneScript,
    instances: Mutex<Vec<PathBuf>>,
    requests: Mutex<Vec<CloneRequest>>,
    started: Notify,
}

impl Shared {
    fn next_script(&self) -> CloneScript {
        lock(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory handing out [`ScriptedRepositoryService`]s that share one script queue.
#[derive(Debug, Clone)]
pub struct ScriptedRepositoryServiceFactory {
    shared: Arc<Shared>,
}

impl ScriptedRepositoryServiceFactory {
    /// Every clone follows `script`.
    pub fn new(script: CloneScript) -> Self {
        Self::with_sequence(Vec::new(), script)
    }

    /// Clones follow `scripts` in order, then `fallback`.
    pub fn with_sequence(scripts: Vec<CloneScript>, fallback: CloneScript) -> Self {
        Self {
            shared: Arc::new(Shared {
                scripts: Mutex::new(scripts.into()),
                fallback,
                instances: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                started: Notify::new(),
            }),
        }
    }

    /// Number of services created.
    pub fn instances(&self) -> usize {
        lock(&self.shared.instances).len()
    }

    /// Repository roots passed to `new_instance`.
    pub fn roots(&self) -> Vec<PathBuf> {
        lock(&self.shared.instances).clone()
    }

    /// Clone requests received, in order.
    pub fn requests(&self) -> Vec<CloneRequest> {
        lock(&self.shared.requests).clone()
    }

    /// Resolve once a clone has started (after its progress was reported).
    pub async fn started(&self) {
        self.shared.started.notified().await;
    }
}

impl RepositoryServiceFactoryPort for ScriptedRepositoryServiceFactory {
    fn new_instance(&self, repo_root: &Path) -> Arc<dyn RepositoryServicePort> {
        lock(&self.shared.instances).push(repo_root.to_path_buf());
        Arc::new(ScriptedRepositoryService {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Repository service that plays back a [`CloneScript`].
#[derive(Debug)]
pub struct ScriptedRepositoryService {
    shared: Arc<Shared>,
}

impl RepositoryServicePort for ScriptedRepositoryService {
    fn clone_repository<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: CloneRequest,
        progress: Arc<dyn CloneProgressSink>,
    ) -> BoxFuture<'a, Result<CloneOutcome>> {
        Box::pin(async move {
            lock(&self.shared.requests).push(request.clone());
            let script = self.shared.next_script();

            for sample in script.progress() {
                ctx.ensure_not_cancelled("scripted_clone.progress")?;
                progress.report(*sample);
                tokio::task::yield_now().await;
            }
            self.shared.started.notify_one();

            match script {
                CloneScript::Succeed {
                    default_branch,
                    head_revision,
                    ..
                } => {
                    ctx.ensure_not_cancelled("scripted_clone.finish")?;
                    Ok(CloneOutcome {
                        default_branch,
                        head_revision,
                        path: request.target,
                    })
                },
                CloneScript::Fail { error, .. } => Err(error),
                CloneScript::WaitForCancel { .. } => {
                    ctx.cancelled().await;
                    ctx.ensure_not_cancelled("scripted_clone.wait")?;
                    Err(ErrorEnvelope::cancelled("clone cancelled"))
                },
            }
        })
    }
}
