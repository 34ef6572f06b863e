//! # clone-pipeline-testkit
//!
//! Test doubles and fixtures for the clone pipeline.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod errors;
pub mod fixtures;
pub mod in_memory;
pub mod repository;
pub mod scheduler;

pub use in_memory::{
    CountingWatermark, NoopLogger, NoopTelemetry, RecordingIndexQueue, RecordingLogger,
    RecordingStatusStore, RecordingTelemetry, ScriptedDiskProbe, StatusCall,
};
pub use repository::{CloneScript, ScriptedRepositoryService, ScriptedRepositoryServiceFactory};
pub use scheduler::ManualScheduler;

/// Returns the testkit crate version.
#[must_use]
pub const fn testkit_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
