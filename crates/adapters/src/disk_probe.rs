//! Disk usage probe backed by `fs2`.

use clone_pipeline_domain::DiskUsage;
use clone_pipeline_ports::{BoxFuture, DiskUsageProbePort};
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::{Path, PathBuf};

/// Reads volume capacity with `statvfs`/`GetDiskFreeSpaceEx`.
///
/// The probed path may not exist yet (a fresh repository root); the nearest
/// existing ancestor is probed instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fs2DiskUsageProbe;

impl Fs2DiskUsageProbe {
    /// Create the probe.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DiskUsageProbePort for Fs2DiskUsageProbe {
    fn probe<'a>(
        &'a self,
        ctx: &'a RequestContext,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<DiskUsage>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            ctx.ensure_not_cancelled("disk_probe.probe")?;
            let label = path.display().to_string();
            tokio::task::spawn_blocking(move || probe_blocking(&path))
                .await
                .map_err(|error| {
                    ErrorEnvelope::unexpected(
                        ErrorCode::internal(),
                        format!("disk probe task failed: {error}"),
                        ErrorClass::Retriable,
                    )
                })?
                .map_err(|error| error.with_metadata("path", label))
        })
    }
}

fn probe_blocking(path: &Path) -> Result<DiskUsage> {
    let existing = nearest_existing(path).ok_or_else(|| {
        ErrorEnvelope::expected(ErrorCode::not_found(), "no existing ancestor to probe")
    })?;
    let total_bytes = fs2::total_space(&existing).map_err(ErrorEnvelope::from)?;
    let available_bytes = fs2::available_space(&existing).map_err(ErrorEnvelope::from)?;
    Ok(DiskUsage {
        total_bytes,
        available_bytes,
    })
}

fn nearest_existing(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| !candidate.as_os_str().is_empty() && candidate.exists())
        .map(Path::to_path_buf)
        .or_else(|| path.is_relative().then(|| PathBuf::from(".")))
}
