//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict (invalid values fail fast) and deterministic (CSV
//! lists normalize to trimmed, deduplicated values). Values of secret-looking
//! variables never appear in error metadata.

use crate::schema::{PipelineConfig, ValidatedPipelineConfig};
use clone_pipeline_domain::GitProtocol;
use clone_pipeline_shared::{ErrorCode, ErrorEnvelope, redact_if_secret};
use std::collections::BTreeMap;
use std::fmt;

/// Env var: working copy root.
pub const ENV_STORAGE_REPO_PATH: &str = "CPL_STORAGE_REPO_PATH";
/// Env var: status record root.
pub const ENV_STORAGE_STATUS_PATH: &str = "CPL_STORAGE_STATUS_PATH";
/// Env var: index queue file.
pub const ENV_STORAGE_INDEX_QUEUE_PATH: &str = "CPL_STORAGE_INDEX_QUEUE_PATH";
/// Env var: clone timeout in milliseconds.
pub const ENV_CLONE_TIMEOUT_MS: &str = "CPL_CLONE_TIMEOUT_MS";
/// Env var: progress write interval in milliseconds.
pub const ENV_CLONE_PROGRESS_INTERVAL_MS: &str = "CPL_CLONE_PROGRESS_INTERVAL_MS";
/// Env var: index enqueue debounce in milliseconds.
pub const ENV_CLONE_INDEX_DEBOUNCE_MS: &str = "CPL_CLONE_INDEX_DEBOUNCE_MS";
/// Env var: git executable.
pub const ENV_CLONE_GIT_BINARY: &str = "CPL_CLONE_GIT_BINARY";
/// Env var: git host allowlist (CSV, full replacement).
pub const ENV_SECURITY_GIT_HOST_WHITELIST: &str = "CPL_SECURITY_GIT_HOST_WHITELIST";
/// Env var: git protocol allowlist (CSV, full replacement).
pub const ENV_SECURITY_GIT_PROTOCOL_WHITELIST: &str = "CPL_SECURITY_GIT_PROTOCOL_WHITELIST";
/// Env var: enable the disk watermark check.
pub const ENV_DISK_THRESHOLD_ENABLED: &str = "CPL_DISK_THRESHOLD_ENABLED";
/// Env var: low watermark (`80%` or `10gb`).
pub const ENV_DISK_WATERMARK_LOW: &str = "CPL_DISK_WATERMARK_LOW";
/// Env var: queue attempt budget.
pub const ENV_QUEUE_MAX_ATTEMPTS: &str = "CPL_QUEUE_MAX_ATTEMPTS";
/// Env var: queue first backoff delay in milliseconds.
pub const ENV_QUEUE_INITIAL_DELAY_MS: &str = "CPL_QUEUE_INITIAL_DELAY_MS";
/// Env var: queue backoff cap in milliseconds.
pub const ENV_QUEUE_MAX_DELAY_MS: &str = "CPL_QUEUE_MAX_DELAY_MS";

const ALL_ENV_VARS: [&str; 14] = [
    ENV_STORAGE_REPO_PATH,
    ENV_STORAGE_STATUS_PATH,
    ENV_STORAGE_INDEX_QUEUE_PATH,
    ENV_CLONE_TIMEOUT_MS,
    ENV_CLONE_PROGRESS_INTERVAL_MS,
    ENV_CLONE_INDEX_DEBOUNCE_MS,
    ENV_CLONE_GIT_BINARY,
    ENV_SECURITY_GIT_HOST_WHITELIST,
    ENV_SECURITY_GIT_PROTOCOL_WHITELIST,
    ENV_DISK_THRESHOLD_ENABLED,
    ENV_DISK_WATERMARK_LOW,
    ENV_QUEUE_MAX_ATTEMPTS,
    ENV_QUEUE_INITIAL_DELAY_MS,
    ENV_QUEUE_MAX_DELAY_MS,
];

const CSV_MAX_ITEMS: usize = 256;

/// Parsed `CPL_*` overrides. `None` leaves the config value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineEnv {
    /// Override for `storage.repoPath`.
    pub storage_repo_path: Option<Box<str>>,
    /// Override for `storage.statusPath`.
    pub storage_status_path: Option<Box<str>>,
    /// Override for `storage.indexQueuePath`.
    pub storage_index_queue_path: Option<Box<str>>,
    /// Override for `clone.timeoutMs`.
    pub clone_timeout_ms: Option<u64>,
    /// Override for `clone.progressIntervalMs`.
    pub clone_progress_interval_ms: Option<u64>,
    /// Override for `clone.indexDebounceMs`.
    pub clone_index_debounce_ms: Option<u64>,
    /// Override for `clone.gitBinary`.
    pub clone_git_binary: Option<Box<str>>,
    /// Override for `security.gitHostWhitelist`.
    pub security_git_host_whitelist: Option<Vec<Box<str>>>,
    /// Override for `security.gitProtocolWhitelist`.
    pub security_git_protocol_whitelist: Option<Vec<GitProtocol>>,
    /// Override for `disk.thresholdEnabled`.
    pub disk_threshold_enabled: Option<bool>,
    /// Override for `disk.watermarkLow`.
    pub disk_watermark_low: Option<Box<str>>,
    /// Override for `queue.maxAttempts`.
    pub queue_max_attempts: Option<u32>,
    /// Override for `queue.initialDelayMs`.
    pub queue_initial_delay_ms: Option<u64>,
    /// Override for `queue.maxDelayMs`.
    pub queue_max_delay_ms: Option<u64>,
}

impl PipelineEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            storage_repo_path: parse_optional_trimmed_string(map, ENV_STORAGE_REPO_PATH)?,
            storage_status_path: parse_optional_trimmed_string(map, ENV_STORAGE_STATUS_PATH)?,
            storage_index_queue_path: parse_optional_trimmed_string(
                map,
                ENV_STORAGE_INDEX_QUEUE_PATH,
            )?,
            clone_timeout_ms: parse_optional_u64(map, ENV_CLONE_TIMEOUT_MS)?,
            clone_progress_interval_ms: parse_optional_u64(map, ENV_CLONE_PROGRESS_INTERVAL_MS)?,
            clone_index_debounce_ms: parse_optional_u64(map, ENV_CLONE_INDEX_DEBOUNCE_MS)?,
            clone_git_binary: parse_optional_trimmed_string(map, ENV_CLONE_GIT_BINARY)?,
            security_git_host_whitelist: parse_optional_hosts(
                map,
                ENV_SECURITY_GIT_HOST_WHITELIST,
            )?,
            security_git_protocol_whitelist: parse_optional_protocols(
                map,
                ENV_SECURITY_GIT_PROTOCOL_WHITELIST,
            )?,
            disk_threshold_enabled: parse_optional_bool(map, ENV_DISK_THRESHOLD_ENABLED)?,
            disk_watermark_low: parse_optional_trimmed_string(map, ENV_DISK_WATERMARK_LOW)?,
            queue_max_attempts: parse_optional_u32(map, ENV_QUEUE_MAX_ATTEMPTS)?,
            queue_initial_delay_ms: parse_optional_u64(map, ENV_QUEUE_INITIAL_DELAY_MS)?,
            queue_max_delay_ms: parse_optional_u64(map, ENV_QUEUE_MAX_DELAY_MS)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map: BTreeMap<String, String> = ALL_ENV_VARS
            .iter()
            .filter_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| ((*name).to_string(), value))
            })
            .collect();
        Self::from_map(&map)
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: PipelineConfig,
    env: &PipelineEnv,
) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let mut config = base;

    set_clone(&mut config.storage.repo_path, env.storage_repo_path.as_ref());
    set_clone(&mut config.storage.status_path, env.storage_status_path.as_ref());
    set_clone(
        &mut config.storage.index_queue_path,
        env.storage_index_queue_path.as_ref(),
    );

    set_copy(&mut config.clone.timeout_ms, env.clone_timeout_ms);
    set_copy(
        &mut config.clone.progress_interval_ms,
        env.clone_progress_interval_ms,
    );
    set_copy(&mut config.clone.index_debounce_ms, env.clone_index_debounce_ms);
    set_clone(&mut config.clone.git_binary, env.clone_git_binary.as_ref());

    set_clone(
        &mut config.security.git_host_whitelist,
        env.security_git_host_whitelist.as_ref(),
    );
    set_clone(
        &mut config.security.git_protocol_whitelist,
        env.security_git_protocol_whitelist.as_ref(),
    );

    set_copy(&mut config.disk.threshold_enabled, env.disk_threshold_enabled);
    set_clone(&mut config.disk.watermark_low, env.disk_watermark_low.as_ref());

    set_copy(&mut config.queue.max_attempts, env.queue_max_attempts);
    set_copy(&mut config.queue.initial_delay_ms, env.queue_initial_delay_ms);
    set_copy(&mut config.queue.max_delay_ms, env.queue_max_delay_ms);

    config.validate_and_normalize().map_err(Into::into)
}

fn set_copy<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_clone<T: Clone>(field: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// CSV list exceeds a safety limit.
    CsvTooLarge {
        /// Env var name.
        var: &'static str,
        /// Number of parsed items.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
            Self::CsvTooLarge { .. } => ErrorCode::new("config", "invalid_env_csv"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
            Self::CsvTooLarge { var, len, max } => {
                write!(formatter, "{var} is too large ({len} items, max {max})")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_if_secret(var, &value)),
            EnvParseError::CsvTooLarge { var, len, max } => envelope
                .with_metadata("env_var", var)
                .with_metadata("len", len.to_string())
                .with_metadata("max", max.to_string()),
        }
    }
}

fn non_empty<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<(&'a str, &'a String)>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some((trimmed, raw)))
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    Ok(non_empty(map, var)?.map(|(trimmed, _)| trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some((trimmed, raw)) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some((trimmed, raw)) = non_empty(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some((trimmed, raw)) = non_empty(map, var)? else {
        return Ok(None);
    };
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: raw.clone(),
        }),
    }
}

fn parse_optional_hosts(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<Box<str>>>, EnvParseError> {
    let Some((trimmed, _)) = non_empty(map, var)? else {
        return Ok(None);
    };
    let mut hosts: Vec<Box<str>> = parse_csv(trimmed)
        .into_iter()
        .map(|host| host.to_ascii_lowercase().into_boxed_str())
        .collect();
    hosts.sort();
    hosts.dedup();
    if hosts.len() > CSV_MAX_ITEMS {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: hosts.len(),
            max: CSV_MAX_ITEMS,
        });
    }
    Ok(Some(hosts))
}

fn parse_optional_protocols(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<GitProtocol>>, EnvParseError> {
    let Some((trimmed, _)) = non_empty(map, var)? else {
        return Ok(None);
    };
    let mut protocols = Vec::new();
    for entry in parse_csv(trimmed) {
        let protocol: GitProtocol = entry
            .parse()
            .map_err(|_| EnvParseError::InvalidEnum { var, value: entry })?;
        if !protocols.contains(&protocol) {
            protocols.push(protocol);
        }
    }
    Ok(Some(protocols))
}

fn parse_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn missing_vars_default_to_none() -> Result<(), Box<dyn Error>> {
        let env = PipelineEnv::from_map(&BTreeMap::new())?;
        assert_eq!(env, PipelineEnv::default());
        Ok(())
    }

    #[test]
    fn csv_hosts_are_normalized_deterministically() -> Result<(), Box<dyn Error>> {
        let env = PipelineEnv::from_map(&env_map(&[(
            ENV_SECURITY_GIT_HOST_WHITELIST,
            " GitLab.com , github.com,,gitlab.com",
        )]))?;
        let hosts = env
            .security_git_host_whitelist
            .ok_or("missing host whitelist")?;
        let as_str: Vec<&str> = hosts.iter().map(AsRef::as_ref).collect();
        assert_eq!(as_str, ["github.com", "gitlab.com"]);
        Ok(())
    }

    #[test]
    fn protocols_must_be_git_transports() -> Result<(), Box<dyn Error>> {
        let env = PipelineEnv::from_map(&env_map(&[(
            ENV_SECURITY_GIT_PROTOCOL_WHITELIST,
            "https, SSH",
        )]))?;
        assert_eq!(
            env.security_git_protocol_whitelist,
            Some(vec![GitProtocol::Https, GitProtocol::Ssh])
        );

        let error = PipelineEnv::from_map(&env_map(&[(
            ENV_SECURITY_GIT_PROTOCOL_WHITELIST,
            "https,ftp",
        )]))
        .err();
        assert!(matches!(error, Some(EnvParseError::InvalidEnum { .. })));
        Ok(())
    }

    #[test]
    fn invalid_values_map_to_config_codes() -> Result<(), Box<dyn Error>> {
        let error = PipelineEnv::from_map(&env_map(&[(ENV_CLONE_TIMEOUT_MS, "soon")]))
            .err()
            .ok_or("expected int error")?;
        let envelope = ErrorEnvelope::from(error);
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_env_int"));
        assert_eq!(
            envelope.metadata.get("env_var").map(String::as_str),
            Some(ENV_CLONE_TIMEOUT_MS)
        );

        let error = PipelineEnv::from_map(&env_map(&[(ENV_DISK_THRESHOLD_ENABLED, "   ")]))
            .err()
            .ok_or("expected empty error")?;
        assert_eq!(error, EnvParseError::EmptyValue {
            var: ENV_DISK_THRESHOLD_ENABLED
        });
        Ok(())
    }

    #[test]
    fn env_wins_over_base_config() -> Result<(), Box<dyn Error>> {
        let env = PipelineEnv::from_map(&env_map(&[
            (ENV_CLONE_INDEX_DEBOUNCE_MS, "250"),
            (ENV_DISK_THRESHOLD_ENABLED, "off"),
            (ENV_DISK_WATERMARK_LOW, "2gb"),
        ]))?;
        let validated = apply_env_overrides(PipelineConfig::default(), &env)?;
        assert_eq!(validated.clone.index_debounce_ms, 250);
        assert!(!validated.disk.threshold_enabled);
        assert_eq!(validated.disk.watermark_low.as_ref(), "2gb");
        Ok(())
    }
}
