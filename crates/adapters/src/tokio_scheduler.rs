//! Deferred task scheduler on the tokio runtime.

use clone_pipeline_ports::{BoxFuture, DeferredTask, SchedulerPort};
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// [`SchedulerPort`] that sleeps on a tokio task per scheduled job.
#[derive(Debug)]
pub struct TokioScheduler {
    handle: Handle,
    tasks: Mutex<JoinSet<()>>,
}

impl TokioScheduler {
    /// Spawn deferred tasks on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Scheduler bound to the runtime the caller is running on.
    pub fn from_current() -> Result<Self> {
        Handle::try_current().map(Self::new).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("no tokio runtime available for the scheduler: {error}"),
                ErrorClass::NonRetriable,
            )
        })
    }

    /// Tasks spawned and not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self) -> JoinSet<()> {
        std::mem::take(&mut *self.lock())
    }
}

impl SchedulerPort for TokioScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let mut tasks = self.lock();
        // Finished tasks are reaped here so the set only holds pending work.
        while let Some(joined) = tasks.try_join_next() {
            if let Err(error) = joined {
                tracing::warn!(%error, "deferred task did not complete");
            }
        }
        tasks.spawn_on(
            async move {
                tokio::time::sleep(delay).await;
                task().await;
            },
            &self.handle,
        );
    }

    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            // Tasks may schedule more work while draining.
            loop {
                let mut tasks = self.take();
                if tasks.is_empty() {
                    break;
                }
                while let Some(joined) = tasks.join_next().await {
                    if let Err(error) = joined {
                        tracing::warn!(%error, "deferred task did not complete");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: &Arc<AtomicUsize>) -> DeferredTask {
        let counter = Arc::clone(counter);
        Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn task_runs_only_after_delay() -> Result<()> {
        let scheduler = TokioScheduler::from_current()?;
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(1), counting_task(&counter));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_every_task() -> Result<()> {
        let scheduler = TokioScheduler::from_current()?;
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(1), counting_task(&counter));
        scheduler.schedule(Duration::from_secs(3), counting_task(&counter));
        assert_eq!(scheduler.in_flight(), 2);

        scheduler.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.in_flight(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn finished_tasks_are_reaped_on_schedule() -> Result<()> {
        let scheduler = TokioScheduler::from_current()?;
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            scheduler.schedule(Duration::ZERO, counting_task(&counter));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);

        scheduler.schedule(Duration::from_secs(1), counting_task(&counter));
        assert_eq!(scheduler.in_flight(), 1);
        Ok(())
    }

    #[test]
    fn from_current_outside_runtime_is_an_error() {
        assert!(TokioScheduler::from_current().is_err());
    }
}
