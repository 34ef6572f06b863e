//! Watermark command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, pretty_json, push_field};
use clone_pipeline_infra::{WatermarkReport, check_watermark};
use std::path::Path;

/// Probe the repository root and report the admission decision.
///
/// A low watermark is reported, not treated as a failure.
pub fn run_watermark(
    mode: OutputMode,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    let report = match check_watermark(config_path, overrides_json) {
        Ok(report) => report,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "watermark": report,
        }))?
    } else {
        format_report_text(&report)
    };
    Ok(CliOutput::new(stdout, String::new(), ExitCode::Ok))
}

fn format_report_text(report: &WatermarkReport) -> String {
    let mut out = String::from("status: ok\n");
    push_field(&mut out, "path", &report.path.to_string_lossy());
    push_field(&mut out, "threshold", &report.threshold);
    push_field(&mut out, "enabled", if report.enabled { "true" } else { "false" });
    push_field(&mut out, "usedPercent", &report.used_percent.to_string());
    push_field(&mut out, "availableBytes", &report.available_bytes.to_string());
    push_field(&mut out, "totalBytes", &report.total_bytes.to_string());
    push_field(&mut out, "low", if report.low { "true" } else { "false" });
    out
}
