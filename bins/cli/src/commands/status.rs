//! Status command handler.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, pretty_json, push_field};
use clone_pipeline_domain::RepositoryRecord;
use clone_pipeline_infra::read_repository_status;
use std::path::Path;

/// Run the status command.
pub fn run_status(
    mode: OutputMode,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    url: &str,
) -> Result<CliOutput, CliError> {
    let record = match read_repository_status(config_path, overrides_json, url) {
        Ok(record) => record,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "repository": record,
        }))?
    } else {
        let mut out = String::from("status: ok\n");
        write_record_text(&mut out, &record);
        out
    };
    Ok(CliOutput::new(stdout, String::new(), ExitCode::Ok))
}

/// `key: value` lines for a repository record.
pub fn write_record_text(out: &mut String, record: &RepositoryRecord) {
    push_field(out, "uri", record.uri.as_str());
    if let Some(url) = record.url.as_deref() {
        push_field(out, "url", url);
    }
    let status = &record.clone_status;
    push_field(out, "phase", status.phase.as_str());
    push_field(out, "progress", &status.progress.to_string());
    if let Some(objects) = status.objects {
        push_field(
            out,
            "objects",
            &format!("{}/{}", objects.received_objects, objects.total_objects),
        );
    }
    if let Some(branch) = record.default_branch.as_deref() {
        push_field(out, "defaultBranch", branch);
    }
    if let Some(revision) = record.head_revision.as_deref() {
        push_field(out, "headRevision", revision);
    }
    if let Some(message) = status.error_message.as_deref() {
        push_field(out, "errorMessage", message);
    }
    push_field(out, "cancelled", if record.cancelled { "true" } else { "false" });
    push_field(out, "updatedAtMs", &status.updated_at_ms.to_string());
}
