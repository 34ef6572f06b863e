//! # clone-pipeline-app
//!
//! Application use cases for the clone pipeline: the clone worker hooks,
//! the disk watermark admission policy, the cancellation registry, and the
//! cancel/status use cases built on them.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod admission;
pub mod cancel;
pub mod cancellation;
pub mod clone_worker;
pub mod errors;
pub mod status;

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use admission::{WatermarkAdmission, WatermarkAdmissionConfig, WatermarkAdmissionDeps};
pub use cancel::{CancelCloneDeps, cancel_clone};
pub use cancellation::{CancellationRegistry, RegistrationId, ReleaseWaiter, ScopedRegistration};
pub use clone_worker::{
    CLONE_QUEUE_NAME, CloneJobResult, CloneWorker, CloneWorkerDeps, CloneWorkerSettings,
    ClonedRepository, DEFAULT_INDEX_DEBOUNCE, ProgressThrottle, WatchProgressSink,
    working_copy_dir,
};
pub use errors::CloneWorkerError;
pub use status::{ReadStatusDeps, read_repository_status};
