//! # clone-pipeline-config
//!
//! Configuration schema, validation, and normalization for the clone pipeline,
//! plus the clone request DTO. This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Clone request DTO and validation.
pub mod requests;
/// Configuration schema types and helpers.
pub mod schema;

pub use schema::{
    CURRENT_CONFIG_VERSION, CloneConfig, ConfigLimits, ConfigSchemaError,
    DEFAULT_GIT_HOST_WHITELIST, DiskConfig, PipelineConfig, QueueConfig, SecurityConfig,
    StorageConfig, ValidatedPipelineConfig, parse_pipeline_config_json,
    parse_pipeline_config_toml,
};

pub use env::{EnvParseError, PipelineEnv, apply_env_overrides};
pub use load::{
    load_pipeline_config_from_path, load_pipeline_config_from_sources,
    load_pipeline_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use requests::{
    CloneRequest, CloneRequestDto, RequestValidationError, ValidatedCloneRequest,
    clone_request_schema, parse_clone_request_json, validate_clone_request,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
