//! Integration tests for env parsing and env-to-config merging.

use clone_pipeline_config::{
    EnvParseError, PipelineConfig, PipelineEnv, apply_env_overrides,
    load_pipeline_config_from_sources,
};
use clone_pipeline_domain::{GitProtocol, WatermarkThreshold};
use clone_pipeline_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

fn read_env_map(relative: &str) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let path = manifest_dir
        .join("..")
        .join("testkit")
        .join("fixtures")
        .join(relative);
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[test]
fn env_fixture_merges_into_effective_config() -> Result<(), Box<dyn Error>> {
    let env = PipelineEnv::from_map(&read_env_map("env/pipeline-env.valid.json")?)?;
    let config = apply_env_overrides(PipelineConfig::default(), &env)?;

    assert_eq!(config.storage.repo_path.as_ref(), "/srv/cpl/repos");
    assert_eq!(config.clone.timeout_ms, 45_000);
    assert_eq!(config.clone.index_debounce_ms, 1_500);
    assert_eq!(config.security.git_protocol_whitelist, [GitProtocol::Https]);
    assert_eq!(config.security.git_host_whitelist.len(), 2);
    assert_eq!(
        config.watermark_threshold(),
        WatermarkThreshold::FreeBytes(512 << 20)
    );
    assert_eq!(config.retry_policy().max_attempts, 5);
    Ok(())
}

#[test]
fn env_beats_file_and_overrides() -> Result<(), Box<dyn Error>> {
    let env = PipelineEnv::from_map(&read_env_map("env/pipeline-env.valid.json")?)?;
    let config = load_pipeline_config_from_sources(
        Some(r#"{ "clone": { "timeoutMs": 10000 } }"#),
        Some(r#"{ "clone": { "timeoutMs": 20000, "progressIntervalMs": 250 } }"#),
        &env,
    )?;
    assert_eq!(config.clone.timeout_ms, 45_000);
    assert_eq!(config.clone.progress_interval_ms, 250);
    Ok(())
}

#[test]
fn invalid_bool_fixture_reports_env_var() -> Result<(), Box<dyn Error>> {
    let error = PipelineEnv::from_map(&read_env_map("env/pipeline-env.invalid-bool.json")?)
        .err()
        .ok_or("expected bool error")?;
    assert!(matches!(error, EnvParseError::InvalidBool { .. }));

    let envelope = ErrorEnvelope::from(error);
    assert_eq!(envelope.code, ErrorCode::new("config", "invalid_env_bool"));
    assert_eq!(
        envelope.metadata.get("env_var").map(String::as_str),
        Some("CPL_DISK_THRESHOLD_ENABLED")
    );
    assert_eq!(envelope.metadata.get("value").map(String::as_str), Some("maybe"));
    Ok(())
}

#[test]
fn out_of_range_env_value_fails_validation() -> Result<(), Box<dyn Error>> {
    let mut map = BTreeMap::new();
    map.insert("CPL_QUEUE_MAX_ATTEMPTS".to_owned(), "99".to_owned());
    let env = PipelineEnv::from_map(&map)?;
    let error = apply_env_overrides(PipelineConfig::default(), &env)
        .err()
        .ok_or("expected limit error")?;
    assert_eq!(error.code, ErrorCode::new("config", "invalid_limit"));
    Ok(())
}
