//! # clone-pipeline-domain
//!
//! Domain entities and value objects for the clone pipeline.
//!
//! - **Repository** - `GitUrl`, `RepositoryUri`, `GitUrlPolicy`
//! - **Jobs** - `Job`, `JobKey`, `CloneJobPayload`, `IndexJobPayload`
//! - **Status** - `RepositoryRecord`, `CloneStatus`, patches
//! - **Watermark** - `DiskUsage`, `WatermarkThreshold`, `evaluate_watermark`
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub use clone_pipeline_shared::shared_crate_version;

pub mod job;
pub mod repository;
pub mod status;
pub mod watermark;

pub use job::{
    CancellationReason, CloneJobPayload, CloneOptions, IndexJobPayload, Job, JobId, JobKey,
    JobKind, JobOptions, now_epoch_ms,
};
pub use repository::{GitProtocol, GitUrl, GitUrlPolicy, RepositoryRefError, RepositoryUri};
pub use status::{
    CloneObjectCounts, ClonePhase, CloneProgressUpdate, CloneStatus, CloneStatusPatch,
    PROGRESS_COMPLETED, PROGRESS_INIT, RepositoryPatch, RepositoryRecord, progress_percentage,
};
pub use watermark::{
    DiskUsage, UsedPercent, WatermarkDecision, WatermarkParseError, WatermarkThreshold,
    evaluate_watermark,
};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
