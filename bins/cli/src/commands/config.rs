//! Config command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, log_info, pretty_json, push_field};
use clone_pipeline_infra::{
    ConfigFormat, clone_request_schema_json, load_effective_config, load_effective_config_json,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Print the effective config. JSON output always embeds it as JSON.
pub fn run_config_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
    format: ConfigFormat,
) -> Result<CliOutput, CliError> {
    let format = if mode.is_json() { ConfigFormat::Json } else { format };
    let rendered = match load_effective_config(env, path, overrides_json, format) {
        Ok(rendered) => rendered,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config show completed", mode.quiet);

    let stdout = if mode.is_json() {
        let config: serde_json::Value = serde_json::from_str(rendered.trim())?;
        pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": path.map(|value| value.to_string_lossy().into_owned()),
            "effectiveConfig": config,
        }))?
    } else {
        rendered
    };
    Ok(CliOutput::new(stdout, stderr, ExitCode::Ok))
}

/// Validate the effective config without printing it.
pub fn run_config_check(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<CliOutput, CliError> {
    if let Err(error) = load_effective_config_json(env, path, overrides_json) {
        return Ok(format_error_output(mode, &error));
    }

    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.quiet);

    let path = path.map(|value| value.to_string_lossy().into_owned());
    let stdout = if mode.is_json() {
        pretty_json(&serde_json::json!({
            "status": "ok",
            "configPath": path,
        }))?
    } else {
        let mut out = String::from("status: ok\nconfig: ok\n");
        if let Some(path) = path.as_deref() {
            push_field(&mut out, "path", path);
        }
        out
    };
    Ok(CliOutput::new(stdout, stderr, ExitCode::Ok))
}

/// Print the clone request JSON schema.
pub fn run_config_schema(mode: OutputMode) -> Result<CliOutput, CliError> {
    match clone_request_schema_json() {
        Ok(schema) => Ok(CliOutput::new(schema, String::new(), ExitCode::Ok)),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}
