//! Disk capacity boundary contracts.

use crate::BoxFuture;
use clone_pipeline_domain::DiskUsage;
use clone_pipeline_shared::{RequestContext, Result};
use std::path::Path;

/// Reads capacity for the volume that holds a path.
pub trait DiskUsageProbePort: Send + Sync {
    /// Snapshot the volume containing `path`.
    fn probe<'a>(&'a self, ctx: &'a RequestContext, path: &'a Path)
    -> BoxFuture<'a, Result<DiskUsage>>;
}

/// Admission check consulted before a clone starts.
pub trait DiskWatermarkPort: Send + Sync {
    /// Returns true when free space is at or below the configured low watermark.
    ///
    /// Implementations with the threshold disabled return `false` without
    /// probing the disk.
    fn is_low_watermark<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<bool>>;

    /// Human-readable threshold (`80%`, `512mb`) for rejection metadata.
    fn threshold_label(&self) -> Option<Box<str>> {
        None
    }
}
