//! # clone-pipeline-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Local clone orchestration.
pub mod clone_local;
/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Logger and telemetry selection.
pub mod observability;
/// Adapter and worker wiring.
pub mod pipeline;
/// Blocking runtime entry points.
pub mod runtime;
/// Status record lookups.
pub mod status_local;
/// Disk watermark report.
pub mod watermark_check;

pub use clone_local::{CloneReport, CloneRunOutcome, Interrupt, run_clone, run_clone_with};
pub use config_check::{
    ConfigFormat, clone_request_schema_json, load_effective_config, load_effective_config_json,
};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use observability::Observability;
pub use pipeline::{Pipeline, PipelinePorts, build_pipeline, build_watermark};
pub use runtime::run_async_with_ctx;
pub use status_local::read_repository_status;
pub use watermark_check::{WatermarkReport, check_watermark, check_watermark_with};

// Re-export redaction utilities for CLI boundary sanitization
pub use clone_pipeline_shared::{is_secret_key, redact_if_secret, redact_url_credentials};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clone_pipeline_adapters::adapters_crate_version;
    use clone_pipeline_app::app_crate_version;
    use clone_pipeline_config::config_crate_version;
    use clone_pipeline_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("clone-pipeline-") {
                let key = line.split('=').next().unwrap_or("").trim();
                deps.push(key.split('.').next().unwrap_or("").trim().to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        let required = [
            "clone-pipeline-app",
            "clone-pipeline-adapters",
            "clone-pipeline-config",
        ];

        for expected in required {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn infra_can_use_app_adapters_config_shared() {
        assert!(!infra_crate_version().is_empty());
        assert!(!app_crate_version().is_empty());
        assert!(!adapters_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }

    #[test]
    fn env_parsing_rejects_bad_numbers() {
        let mut env = std::collections::BTreeMap::new();
        env.insert("CPL_CLONE_TIMEOUT_MS".to_owned(), "soon".to_owned());
        assert!(validate_env_parsing(&env).is_err());
        assert!(validate_env_parsing(&std::collections::BTreeMap::new()).is_ok());
    }
}
