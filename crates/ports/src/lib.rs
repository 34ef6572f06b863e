//! # clone-pipeline-ports
//!
//! Port traits for the clone-pipeline hexagonal architecture.
//!
//! This crate defines the interfaces between the clone worker and its
//! collaborators: repository services, the status store, the downstream index
//! queue, the disk watermark, and deferred scheduling. It depends only on
//! `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod logger;
pub mod queue;
pub mod repository;
pub mod scheduler;
pub mod status_store;
pub mod telemetry;
pub mod watermark;

pub use logger::*;
pub use queue::*;
pub use repository::*;
pub use scheduler::*;
pub use status_store::*;
pub use telemetry::*;
pub use watermark::*;

// Domain types that appear in port signatures, so adapters can implement
// ports without naming `clone-pipeline-domain` directly.
pub use clone_pipeline_domain::{
    CloneJobPayload, CloneOptions, CloneProgressUpdate, CloneStatusPatch, DiskUsage, GitUrl,
    IndexJobPayload, Job, RepositoryPatch, RepositoryRecord, RepositoryUri,
};

#[cfg(test)]
mod tests {
    use super::*;
    use clone_pipeline_domain::domain_crate_version;
    use clone_pipeline_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("clone-pipeline-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn ports_depends_only_on_domain_and_shared() {
        let deps = workspace_deps();
        let allowed = ["clone-pipeline-domain", "clone-pipeline-shared"];

        for dep in &deps {
            assert!(
                allowed.contains(&dep.as_str()),
                "unexpected dependency found: {dep}"
            );
        }
        for expected in allowed {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn ports_can_use_domain_and_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}
