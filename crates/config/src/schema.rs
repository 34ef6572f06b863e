//! Pipeline configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization lowercases and dedupes allowlists so comparisons are stable.

use clone_pipeline_domain::{GitProtocol, GitUrlPolicy, WatermarkThreshold};
use clone_pipeline_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const CLONE_TIMEOUT_MIN_MS: u64 = 1_000;
const CLONE_TIMEOUT_MAX_MS: u64 = 86_400_000;
const CLONE_PROGRESS_INTERVAL_MIN_MS: u64 = 50;
const CLONE_PROGRESS_INTERVAL_MAX_MS: u64 = 60_000;
const CLONE_INDEX_DEBOUNCE_MIN_MS: u64 = 0;
const CLONE_INDEX_DEBOUNCE_MAX_MS: u64 = 60_000;

const QUEUE_MAX_ATTEMPTS_MIN: u32 = 1;
const QUEUE_MAX_ATTEMPTS_MAX: u32 = 10;
const QUEUE_DELAY_MIN_MS: u64 = 1;
const QUEUE_INITIAL_DELAY_MAX_MS: u64 = 60_000;
const QUEUE_MAX_DELAY_MAX_MS: u64 = 600_000;
const QUEUE_JITTER_RATIO_PCT_MIN: u32 = 0;
const QUEUE_JITTER_RATIO_PCT_MAX: u32 = 100;

const SECURITY_HOST_WHITELIST_MAX: usize = 256;

/// Default git hosts accepted for cloning.
pub const DEFAULT_GIT_HOST_WHITELIST: [&str; 5] = [
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "gitbox.apache.org",
    "eclipse.org",
];

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// On-disk locations.
    pub storage: StorageConfig,
    /// Clone job settings.
    pub clone: CloneConfig,
    /// URL allowlists.
    pub security: SecurityConfig,
    /// Disk watermark settings.
    pub disk: DiskConfig,
    /// In-process queue retry settings.
    pub queue: QueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            storage: StorageConfig::default(),
            clone: CloneConfig::default(),
            security: SecurityConfig::default(),
            disk: DiskConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedPipelineConfig, ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }

        self.storage.normalize_and_validate()?;
        self.clone.normalize_and_validate()?;
        self.security.normalize_and_validate()?;
        let watermark = self.disk.normalize_and_validate()?;
        self.queue.validate()?;

        let limits = ConfigLimits::new(&self)?;
        let url_policy = GitUrlPolicy::new(
            self.security.git_host_whitelist.iter(),
            self.security.git_protocol_whitelist.clone(),
        );
        Ok(ValidatedPipelineConfig {
            raw: self,
            limits,
            watermark,
            url_policy,
        })
    }
}

/// Validated config wrapper carrying parsed and bounded values.
#[derive(Debug, Clone)]
pub struct ValidatedPipelineConfig {
    raw: PipelineConfig,
    limits: ConfigLimits,
    watermark: WatermarkThreshold,
    url_policy: GitUrlPolicy,
}

impl ValidatedPipelineConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &PipelineConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> PipelineConfig {
        self.raw
    }

    /// Parsed low watermark.
    #[must_use]
    pub const fn watermark_threshold(&self) -> WatermarkThreshold {
        self.watermark
    }

    /// Allowlists as a URL policy.
    #[must_use]
    pub const fn url_policy(&self) -> &GitUrlPolicy {
        &self.url_policy
    }

    /// Per-attempt clone deadline.
    #[must_use]
    pub const fn clone_timeout(&self) -> Duration {
        Duration::from_millis(self.limits.clone_timeout_ms.get())
    }

    /// Minimum gap between progress writes.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.limits.progress_interval_ms.get())
    }

    /// Delay between clone completion and the index enqueue.
    #[must_use]
    pub const fn index_debounce(&self) -> Duration {
        Duration::from_millis(self.limits.index_debounce_ms.get())
    }

    /// Retry policy for the in-process queue.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.limits.queue_max_attempts.get(),
            base_delay_ms: self.raw.queue.initial_delay_ms,
            max_delay_ms: self.raw.queue.max_delay_ms,
            jitter_ratio_pct: self.raw.queue.jitter_ratio_pct,
        }
    }

    /// Root directory for working copies.
    #[must_use]
    pub fn repo_path(&self) -> PathBuf {
        PathBuf::from(self.raw.storage.repo_path.as_ref())
    }

    /// Root directory for status records.
    #[must_use]
    pub fn status_path(&self) -> PathBuf {
        PathBuf::from(self.raw.storage.status_path.as_ref())
    }

    /// Index queue file.
    #[must_use]
    pub fn index_queue_path(&self) -> PathBuf {
        PathBuf::from(self.raw.storage.index_queue_path.as_ref())
    }
}

impl AsRef<PipelineConfig> for ValidatedPipelineConfig {
    fn as_ref(&self) -> &PipelineConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedPipelineConfig {
    type Target = PipelineConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimits {
    /// Clone timeout (ms).
    pub clone_timeout_ms: BoundedU64<CLONE_TIMEOUT_MIN_MS, CLONE_TIMEOUT_MAX_MS>,
    /// Progress write interval (ms).
    pub progress_interval_ms:
        BoundedU64<CLONE_PROGRESS_INTERVAL_MIN_MS, CLONE_PROGRESS_INTERVAL_MAX_MS>,
    /// Index enqueue debounce (ms).
    pub index_debounce_ms: BoundedU64<CLONE_INDEX_DEBOUNCE_MIN_MS, CLONE_INDEX_DEBOUNCE_MAX_MS>,
    /// Queue attempt budget.
    pub queue_max_attempts: BoundedU32<QUEUE_MAX_ATTEMPTS_MIN, QUEUE_MAX_ATTEMPTS_MAX>,
}

impl ConfigLimits {
    fn new(config: &PipelineConfig) -> Result<Self, ConfigSchemaError> {
        Ok(Self {
            clone_timeout_ms: bounded_ms(
                "clone",
                "timeoutMs",
                config.clone.timeout_ms,
                CLONE_TIMEOUT_MIN_MS,
                CLONE_TIMEOUT_MAX_MS,
            )?,
            progress_interval_ms: bounded_ms(
                "clone",
                "progressIntervalMs",
                config.clone.progress_interval_ms,
                CLONE_PROGRESS_INTERVAL_MIN_MS,
                CLONE_PROGRESS_INTERVAL_MAX_MS,
            )?,
            index_debounce_ms: bounded_ms(
                "clone",
                "indexDebounceMs",
                config.clone.index_debounce_ms,
                CLONE_INDEX_DEBOUNCE_MIN_MS,
                CLONE_INDEX_DEBOUNCE_MAX_MS,
            )?,
            queue_max_attempts: BoundedU32::try_new(config.queue.max_attempts).map_err(|_| {
                ConfigSchemaError::LimitOutOfRange {
                    section: "queue",
                    field: "maxAttempts",
                    value: u64::from(config.queue.max_attempts),
                    min: u64::from(QUEUE_MAX_ATTEMPTS_MIN),
                    max: u64::from(QUEUE_MAX_ATTEMPTS_MAX),
                }
            })?,
        })
    }
}

/// Parse a pipeline config from a JSON string, applying validation and normalization.
pub fn parse_pipeline_config_json(input: &str) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let config: PipelineConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a pipeline config from a TOML string, applying validation and normalization.
pub fn parse_pipeline_config_toml(input: &str) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let config: PipelineConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// On-disk locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Root directory for working copies (`<repoPath>/<host>/<owner>/<name>`).
    pub repo_path: Box<str>,
    /// Root directory for per-repository status records.
    pub status_path: Box<str>,
    /// JSONL file receiving index jobs.
    pub index_queue_path: Box<str>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            repo_path: ".cpl/repos".into(),
            status_path: ".cpl/status".into(),
            index_queue_path: ".cpl/index-queue.jsonl".into(),
        }
    }
}

impl StorageConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        for (field, value) in [
            ("repoPath", &mut self.repo_path),
            ("statusPath", &mut self.status_path),
            ("indexQueuePath", &mut self.index_queue_path),
        ] {
            normalize_boxed_str(value);
            if value.is_empty() || value.contains('\0') {
                return Err(ConfigSchemaError::InvalidPath {
                    section: "storage",
                    field,
                    path: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Clone job settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CloneConfig {
    /// Per-attempt deadline (ms).
    pub timeout_ms: u64,
    /// Minimum gap between progress writes (ms).
    pub progress_interval_ms: u64,
    /// Delay between completion and the index enqueue (ms).
    pub index_debounce_ms: u64,
    /// Git executable used by the repository service.
    pub git_binary: Box<str>,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_600_000,
            progress_interval_ms: 1_000,
            index_debounce_ms: 1_000,
            git_binary: "git".into(),
        }
    }
}

impl CloneConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        normalize_boxed_str(&mut self.git_binary);
        if self.git_binary.is_empty() {
            return Err(ConfigSchemaError::InvalidPath {
                section: "clone",
                field: "gitBinary",
                path: String::new(),
            });
        }
        Ok(())
    }
}

/// URL allowlists. An empty list allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SecurityConfig {
    /// Hosts a repository URL may point at.
    pub git_host_whitelist: Vec<Box<str>>,
    /// Protocols a repository URL may use.
    pub git_protocol_whitelist: Vec<GitProtocol>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            git_host_whitelist: DEFAULT_GIT_HOST_WHITELIST
                .iter()
                .map(|host| Box::from(*host))
                .collect(),
            git_protocol_whitelist: vec![GitProtocol::Https, GitProtocol::Git, GitProtocol::Ssh],
        }
    }
}

impl SecurityConfig {
    fn normalize_and_validate(&mut self) -> Result<(), ConfigSchemaError> {
        let mut hosts: Vec<Box<str>> = Vec::with_capacity(self.git_host_whitelist.len());
        for raw in &self.git_host_whitelist {
            let host = raw.trim().to_ascii_lowercase();
            if host.is_empty() || !host.chars().all(is_host_char) {
                return Err(ConfigSchemaError::InvalidHost {
                    host: raw.to_string(),
                });
            }
            hosts.push(host.into_boxed_str());
        }
        hosts.sort();
        hosts.dedup();
        if hosts.len() > SECURITY_HOST_WHITELIST_MAX {
            return Err(ConfigSchemaError::ListTooLarge {
                section: "security",
                field: "gitHostWhitelist",
                len: hosts.len(),
                max: SECURITY_HOST_WHITELIST_MAX,
            });
        }
        self.git_host_whitelist = hosts;

        let mut protocols = Vec::with_capacity(self.git_protocol_whitelist.len());
        for protocol in &self.git_protocol_whitelist {
            if !protocols.contains(protocol) {
                protocols.push(*protocol);
            }
        }
        self.git_protocol_whitelist = protocols;
        Ok(())
    }
}

/// Disk watermark settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DiskConfig {
    /// When false, admission never probes the disk.
    pub threshold_enabled: bool,
    /// Used-space percentage (`"80%"`) or free-space floor (`"10gb"`).
    pub watermark_low: Box<str>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            threshold_enabled: true,
            watermark_low: "80%".into(),
        }
    }
}

impl DiskConfig {
    fn normalize_and_validate(&mut self) -> Result<WatermarkThreshold, ConfigSchemaError> {
        normalize_boxed_str(&mut self.watermark_low);
        self.watermark_low
            .parse()
            .map_err(|error: clone_pipeline_domain::WatermarkParseError| {
                ConfigSchemaError::InvalidWatermark {
                    value: self.watermark_low.to_string(),
                    reason: error.to_string(),
                }
            })
    }
}

/// In-process queue retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct QueueConfig {
    /// Attempts per job, including the first.
    pub max_attempts: u32,
    /// First backoff delay (ms).
    pub initial_delay_ms: u64,
    /// Backoff cap (ms).
    pub max_delay_ms: u64,
    /// Jitter as a percentage of each delay.
    pub jitter_ratio_pct: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.base_delay_ms,
            max_delay_ms: policy.max_delay_ms,
            jitter_ratio_pct: policy.jitter_ratio_pct,
        }
    }
}

impl QueueConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit(
            "queue",
            "initialDelayMs",
            self.initial_delay_ms,
            QUEUE_DELAY_MIN_MS,
            QUEUE_INITIAL_DELAY_MAX_MS,
        )?;
        validate_limit(
            "queue",
            "maxDelayMs",
            self.max_delay_ms,
            QUEUE_DELAY_MIN_MS,
            QUEUE_MAX_DELAY_MAX_MS,
        )?;
        validate_limit(
            "queue",
            "jitterRatioPct",
            u64::from(self.jitter_ratio_pct),
            u64::from(QUEUE_JITTER_RATIO_PCT_MIN),
            u64::from(QUEUE_JITTER_RATIO_PCT_MAX),
        )?;
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigSchemaError::InvalidRetryDelays {
                initial_delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
            });
        }
        Ok(())
    }
}

/// Typed validation errors for the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A timeout or interval is out of bounds.
    TimeoutOutOfRange {
        /// Schema section (e.g. `clone`).
        section: &'static str,
        /// Field name in the config file (e.g. `timeoutMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `queue`).
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A list field exceeds the maximum allowed size.
    ListTooLarge {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Number of entries after deduplication.
        len: usize,
        /// Maximum allowed number of entries.
        max: usize,
    },
    /// A path entry is empty or contains a NUL byte.
    InvalidPath {
        /// Schema section.
        section: &'static str,
        /// Field name in the config file.
        field: &'static str,
        /// Invalid path value.
        path: String,
    },
    /// A host allowlist entry is not a bare hostname.
    InvalidHost {
        /// Invalid host value.
        host: String,
    },
    /// `disk.watermarkLow` is not a percentage or size.
    InvalidWatermark {
        /// Invalid value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// `queue.initialDelayMs` exceeds `queue.maxDelayMs`.
    InvalidRetryDelays {
        /// Initial delay (ms).
        initial_delay_ms: u64,
        /// Maximum delay (ms).
        max_delay_ms: u64,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } | Self::InvalidRetryDelays { .. } => {
                ErrorCode::new("config", "invalid_limit")
            },
            Self::ListTooLarge { .. } => ErrorCode::new("config", "list_too_large"),
            Self::InvalidPath { .. } => ErrorCode::new("config", "invalid_path"),
            Self::InvalidHost { .. } => ErrorCode::new("config", "invalid_host"),
            Self::InvalidWatermark { .. } => ErrorCode::new("config", "invalid_watermark"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported config version: {found} (supported: {supported})"
            ),
            Self::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{section}.{field} must be between {min_ms} and {max_ms} ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be between {min} and {max} (got {value})"
            ),
            Self::ListTooLarge {
                section,
                field,
                len,
                max,
            } => write!(
                formatter,
                "{section}.{field} has too many entries ({len}, max {max})"
            ),
            Self::InvalidPath { section, field, .. } => {
                write!(formatter, "{section}.{field} must be a non-empty path")
            },
            Self::InvalidHost { host } => {
                write!(formatter, "security.gitHostWhitelist entry `{host}` is not a hostname")
            },
            Self::InvalidWatermark { reason, .. } => {
                write!(formatter, "disk.watermarkLow is invalid: {reason}")
            },
            Self::InvalidRetryDelays {
                initial_delay_ms,
                max_delay_ms,
            } => write!(
                formatter,
                "queue.initialDelayMs ({initial_delay_ms}) must not exceed queue.maxDelayMs ({max_delay_ms})"
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => envelope
                .with_metadata("found", found.to_string())
                .with_metadata("supported", supported.to_string()),
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value_ms", value_ms.to_string())
                .with_metadata("min_ms", min_ms.to_string())
                .with_metadata("max_ms", max_ms.to_string()),
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::ListTooLarge {
                section,
                field,
                len,
                max,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("len", len.to_string())
                .with_metadata("max", max.to_string()),
            ConfigSchemaError::InvalidPath {
                section,
                field,
                path,
            } => envelope
                .with_metadata("section", section)
                .with_metadata("field", field)
                .with_metadata("path", path),
            ConfigSchemaError::InvalidHost { host } => envelope.with_metadata("host", host),
            ConfigSchemaError::InvalidWatermark { value, .. } => {
                envelope.with_metadata("value", value)
            },
            ConfigSchemaError::InvalidRetryDelays {
                initial_delay_ms,
                max_delay_ms,
            } => envelope
                .with_metadata("initial_delay_ms", initial_delay_ms.to_string())
                .with_metadata("max_delay_ms", max_delay_ms.to_string()),
        }
    }
}

fn bounded_ms<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value_ms).map_err(|_| ConfigSchemaError::TimeoutOutOfRange {
        section,
        field,
        value_ms,
        min_ms,
        max_ms,
    })
}

const fn validate_limit(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn normalize_boxed_str(value: &mut Box<str>) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_owned().into_boxed_str();
    }
}

const fn is_host_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | ':')
}
