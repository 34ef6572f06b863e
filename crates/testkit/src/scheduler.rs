//! Virtual-clock scheduler.

use clone_pipeline_ports::{BoxFuture, DeferredTask, SchedulerPort};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct Pending {
    due: Duration,
    seq: u64,
    task: DeferredTask,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
    delays: Vec<Duration>,
}

/// Scheduler whose clock only moves when a test calls [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks not yet run.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Delays passed to `schedule`, in call order.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.lock().delays.clone()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Move the clock forward and run every task that became due, in due order.
    /// Returns the number of tasks run.
    pub async fn advance(&self, by: Duration) -> usize {
        let due = {
            let mut state = self.lock();
            state.now += by;
            let now = state.now;
            take_due(&mut state, |pending| pending.due <= now)
        };
        run_all(due).await
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn take_due(state: &mut State, is_due: impl Fn(&Pending) -> bool) -> Vec<DeferredTask> {
    let (mut due, rest): (Vec<Pending>, Vec<Pending>) =
        std::mem::take(&mut state.pending).into_iter().partition(is_due);
    state.pending = rest;
    due.sort_by_key(|pending| (pending.due, pending.seq));
    due.into_iter().map(|pending| pending.task).collect()
}

async fn run_all(tasks: Vec<DeferredTask>) -> usize {
    let count = tasks.len();
    for task in tasks {
        task().await;
    }
    count
}

impl SchedulerPort for ManualScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.delays.push(delay);
        state.pending.push(Pending { due, seq, task });
    }

    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let tasks = take_due(&mut self.lock(), |_| true);
            run_all(tasks).await;
        })
    }
}
