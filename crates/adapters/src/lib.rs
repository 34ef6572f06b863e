//! # clone-pipeline-adapters
//!
//! Adapter implementations for the clone pipeline ports: the git CLI
//! repository service, disk probe, filesystem status store, JSONL index
//! queue, tokio scheduler, in-process job queue, and logging/telemetry sinks.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod disk_probe;
pub mod fs_status_store;
pub mod git_cli;
pub mod in_process_queue;
pub mod jsonl_index_queue;
pub mod log_sink;
pub mod logger;
pub mod telemetry;
pub mod tokio_scheduler;

pub use disk_probe::Fs2DiskUsageProbe;
pub use fs_status_store::FsStatusStore;
pub use git_cli::{GitCliRepositoryService, GitCliRepositoryServiceFactory};
pub use in_process_queue::{InProcessQueue, InProcessQueueConfig, JobHandle, JobOutcome};
pub use jsonl_index_queue::JsonlIndexQueue;
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::{JsonLogger, TracingLogger};
pub use telemetry::{JsonTelemetry, TracingTelemetry};
pub use tokio_scheduler::TokioScheduler;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
