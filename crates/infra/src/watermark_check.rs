//! Report the disk watermark decision for the configured repository root.

use crate::runtime::run_async_with_ctx;
use crate::InfraResult;
use clone_pipeline_adapters::Fs2DiskUsageProbe;
use clone_pipeline_config::{ValidatedPipelineConfig, load_pipeline_config_std_env};
use clone_pipeline_domain::evaluate_watermark;
use clone_pipeline_ports::DiskUsageProbePort;
use clone_pipeline_shared::RequestContext;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Snapshot of the admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkReport {
    /// Probed path (the repository root).
    pub path: PathBuf,
    /// Configured threshold.
    pub threshold: String,
    /// Whether admission consults the threshold at all.
    pub enabled: bool,
    /// Volume size in bytes.
    pub total_bytes: u64,
    /// Bytes available.
    pub available_bytes: u64,
    /// Used percentage.
    pub used_percent: u64,
    /// True when new clones would be rejected.
    pub low: bool,
}

/// Probe the repository root's volume and evaluate the configured watermark.
pub fn check_watermark(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<WatermarkReport> {
    let config = load_pipeline_config_std_env(config_path, overrides_json)?;
    run_async_with_ctx(RequestContext::new_request(), |ctx| async move {
        check_watermark_with(&ctx, &config, &Fs2DiskUsageProbe::new()).await
    })
}

/// Evaluate the watermark with an explicit probe.
///
/// The volume is probed even when the threshold is disabled, so operators can
/// see where they stand; `low` is then always false.
pub async fn check_watermark_with(
    ctx: &RequestContext,
    config: &ValidatedPipelineConfig,
    probe: &dyn DiskUsageProbePort,
) -> InfraResult<WatermarkReport> {
    let path = config.repo_path();
    let usage = probe.probe(ctx, &path).await?;
    let threshold = config.watermark_threshold();
    let enabled = config.disk.threshold_enabled;
    let decision = evaluate_watermark(usage, threshold);

    Ok(WatermarkReport {
        path,
        threshold: threshold.to_string(),
        enabled,
        total_bytes: usage.total_bytes,
        available_bytes: usage.available_bytes,
        used_percent: usage.used_percent(),
        low: enabled && decision.is_low(),
    })
}
