//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{PipelineConfig, PipelineEnv, ValidatedPipelineConfig, apply_env_overrides};
use clone_pipeline_domain::GitProtocol;
use clone_pipeline_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the pipeline config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`PipelineEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`PipelineConfig::default()`)
pub fn load_pipeline_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &PipelineEnv,
) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let config = match config_json {
        None => PipelineConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the pipeline config from an optional file path (`.json` or `.toml`).
pub fn load_pipeline_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &PipelineEnv,
) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let config = match config_path {
        None => PipelineConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };
    merge_and_validate(config, overrides_json, env)
}

/// Load the pipeline config from std env and an optional file path.
pub fn load_pipeline_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let env = PipelineEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_pipeline_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &PipelineConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("core", "internal"),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &PipelineConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

fn merge_and_validate(
    mut config: PipelineConfig,
    overrides_json: Option<&str>,
    env: &PipelineEnv,
) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        overrides.apply(&mut config);
    }

    // env goes last and also validates the merged result.
    apply_env_overrides(config, env)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<PipelineConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<PipelineConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct PipelineConfigOverrides {
    version: Option<u32>,
    storage: StorageOverrides,
    clone: CloneOverrides,
    security: SecurityOverrides,
    disk: DiskOverrides,
    queue: QueueOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct StorageOverrides {
    repo_path: Option<Box<str>>,
    status_path: Option<Box<str>>,
    index_queue_path: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct CloneOverrides {
    timeout_ms: Option<u64>,
    progress_interval_ms: Option<u64>,
    index_debounce_ms: Option<u64>,
    git_binary: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct SecurityOverrides {
    git_host_whitelist: Option<Vec<Box<str>>>,
    git_protocol_whitelist: Option<Vec<GitProtocol>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct DiskOverrides {
    threshold_enabled: Option<bool>,
    watermark_low: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct QueueOverrides {
    max_attempts: Option<u32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    jitter_ratio_pct: Option<u32>,
}

impl PipelineConfigOverrides {
    fn apply(&self, config: &mut PipelineConfig) {
        set(&mut config.version, self.version.as_ref());

        set(&mut config.storage.repo_path, self.storage.repo_path.as_ref());
        set(
            &mut config.storage.status_path,
            self.storage.status_path.as_ref(),
        );
        set(
            &mut config.storage.index_queue_path,
            self.storage.index_queue_path.as_ref(),
        );

        set(&mut config.clone.timeout_ms, self.clone.timeout_ms.as_ref());
        set(
            &mut config.clone.progress_interval_ms,
            self.clone.progress_interval_ms.as_ref(),
        );
        set(
            &mut config.clone.index_debounce_ms,
            self.clone.index_debounce_ms.as_ref(),
        );
        set(&mut config.clone.git_binary, self.clone.git_binary.as_ref());

        set(
            &mut config.security.git_host_whitelist,
            self.security.git_host_whitelist.as_ref(),
        );
        set(
            &mut config.security.git_protocol_whitelist,
            self.security.git_protocol_whitelist.as_ref(),
        );

        set(
            &mut config.disk.threshold_enabled,
            self.disk.threshold_enabled.as_ref(),
        );
        set(
            &mut config.disk.watermark_low,
            self.disk.watermark_low.as_ref(),
        );

        set(&mut config.queue.max_attempts, self.queue.max_attempts.as_ref());
        set(
            &mut config.queue.initial_delay_ms,
            self.queue.initial_delay_ms.as_ref(),
        );
        set(&mut config.queue.max_delay_ms, self.queue.max_delay_ms.as_ref());
        set(
            &mut config.queue.jitter_ratio_pct,
            self.queue.jitter_ratio_pct.as_ref(),
        );
    }
}

fn set<T: Clone>(field: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}
