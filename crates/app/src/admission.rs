//! Disk watermark admission policy.
//!
//! Combines a [`DiskUsageProbePort`] with the configured threshold. The check
//! is advisory: it runs once per execution attempt and does not reserve space.

use crate::CloneWorkerError;
use clone_pipeline_domain::{WatermarkThreshold, evaluate_watermark};
use clone_pipeline_ports::{
    BoxFuture, DiskUsageProbePort, DiskWatermarkPort, LogFields, LoggerPort, TelemetryPort,
};
use clone_pipeline_shared::{ErrorEnvelope, RequestContext, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Admission settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkAdmissionConfig {
    /// When false, admission never probes and never reports low.
    pub enabled: bool,
    /// Low watermark.
    pub threshold: WatermarkThreshold,
    /// Path whose volume is probed (the working copy root).
    pub path: PathBuf,
}

/// Dependencies of [`WatermarkAdmission`].
#[derive(Clone)]
pub struct WatermarkAdmissionDeps {
    /// Disk probe adapter.
    pub probe: Arc<dyn DiskUsageProbePort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

/// [`DiskWatermarkPort`] backed by a disk probe.
pub struct WatermarkAdmission {
    deps: WatermarkAdmissionDeps,
    config: WatermarkAdmissionConfig,
}

impl WatermarkAdmission {
    /// Create the policy.
    #[must_use]
    pub const fn new(deps: WatermarkAdmissionDeps, config: WatermarkAdmissionConfig) -> Self {
        Self { deps, config }
    }

    async fn check(&self, ctx: &RequestContext) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        let timer = self
            .deps
            .telemetry
            .as_ref()
            .map(|telemetry| telemetry.start_timer("clone.admission.probe", None));
        let probed = self.deps.probe.probe(ctx, &self.config.path).await;
        if let Some(timer) = timer.as_ref() {
            timer.stop();
        }

        let usage = probed.map_err(|error| self.probe_failed(&error))?;
        let decision = evaluate_watermark(usage, self.config.threshold);

        if decision.is_low()
            && let Some(logger) = self.deps.logger.as_ref()
        {
            let mut fields = LogFields::new();
            fields.insert("path".into(), Value::String(self.path_label()));
            fields.insert(
                "threshold".into(),
                Value::String(self.config.threshold.to_string()),
            );
            fields.insert("usedPercent".into(), Value::from(usage.used_percent()));
            fields.insert("availableBytes".into(), Value::from(usage.available_bytes));
            logger.warn(
                "clone.admission.low",
                "Disk usage is at or past the low watermark",
                Some(fields),
            );
        }
        Ok(decision.is_low())
    }

    fn probe_failed(&self, error: &ErrorEnvelope) -> ErrorEnvelope {
        ErrorEnvelope::from(CloneWorkerError::AdmissionProbeFailed {
            path: self.path_label(),
            reason: error.message.clone(),
        })
        .with_metadata("cause", error.code.to_string())
    }

    fn path_label(&self) -> String {
        self.config.path.to_string_lossy().into_owned()
    }
}

impl DiskWatermarkPort for WatermarkAdmission {
    fn is_low_watermark<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.check(ctx))
    }

    fn threshold_label(&self) -> Option<Box<str>> {
        Some(self.config.threshold.to_string().into_boxed_str())
    }
}
