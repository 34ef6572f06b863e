//! Deferred task scheduling boundary contract.

use crate::BoxFuture;
use std::time::Duration;

/// Work run once after a delay.
pub type DeferredTask = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Runs tasks after a delay without blocking the caller.
pub trait SchedulerPort: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: DeferredTask);

    /// Wait until every task scheduled so far has run.
    fn drain(&self) -> BoxFuture<'_, ()>;
}
