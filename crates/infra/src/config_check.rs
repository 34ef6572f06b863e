//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use clone_pipeline_config::{
    PipelineEnv, clone_request_schema, load_pipeline_config_from_path, to_pretty_json,
    to_pretty_toml,
};
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::path::Path;

/// Output format of the effective config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Pretty JSON.
    Json,
    /// Pretty TOML.
    Toml,
}

/// Load and validate the effective config, returning it rendered in `format`.
pub fn load_effective_config(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    format: ConfigFormat,
) -> InfraResult<String> {
    let env = PipelineEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let config = load_pipeline_config_from_path(config_path, overrides_json, &env)?;
    match format {
        ConfigFormat::Json => to_pretty_json(&config),
        ConfigFormat::Toml => to_pretty_toml(&config),
    }
}

/// Load and validate the effective config, returning deterministic pretty JSON.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    load_effective_config(env, config_path, overrides_json, ConfigFormat::Json)
}

/// JSON schema of the clone request payload, pretty printed.
pub fn clone_request_schema_json() -> InfraResult<String> {
    let mut output = serde_json::to_string_pretty(&clone_request_schema()).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize schema: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}
