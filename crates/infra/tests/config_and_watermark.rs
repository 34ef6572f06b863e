//! Config rendering and watermark reporting used by the CLI.

use clone_pipeline_config::{PipelineConfig, ValidatedPipelineConfig};
use clone_pipeline_domain::DiskUsage;
use clone_pipeline_infra::config_check::ConfigFormat;
use clone_pipeline_infra::{
    check_watermark_with, load_effective_config, load_effective_config_json,
    validate_env_parsing,
};
use clone_pipeline_shared::{ErrorEnvelope, RequestContext};
use clone_pipeline_testkit::ScriptedDiskProbe;
use clone_pipeline_testkit::fixtures::{fixture_path, load_json_fixture};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;

type TestResult = Result<(), Box<dyn Error>>;

const GIB: u64 = 1 << 30;

#[test]
fn valid_json_fixture_is_normalized() -> TestResult {
    let path = fixture_path("config/pipeline-config.valid.json");
    let rendered = load_effective_config_json(&BTreeMap::new(), Some(&path), None)?;
    let value: Value = serde_json::from_str(&rendered)?;

    assert_eq!(value["storage"]["repoPath"], "/var/lib/cpl/repos");
    assert_eq!(
        value["security"]["gitHostWhitelist"],
        serde_json::json!(["github.com", "gitlab.com"])
    );
    assert_eq!(value["queue"]["maxAttempts"], 2);
    Ok(())
}

#[test]
fn env_fixture_wins_over_file_and_overrides() -> TestResult {
    let env: BTreeMap<String, String> = load_json_fixture("env/pipeline-env.valid.json")?;
    let path = fixture_path("config/pipeline-config.valid.json");
    let rendered = load_effective_config_json(
        &env,
        Some(&path),
        Some(r#"{"clone":{"timeoutMs":30000}}"#),
    )?;
    let value: Value = serde_json::from_str(&rendered)?;

    assert_eq!(value["storage"]["repoPath"], "/srv/cpl/repos");
    assert_eq!(value["clone"]["timeoutMs"], 45000);
    assert_eq!(value["disk"]["watermarkLow"], "512mb");
    assert_eq!(value["queue"]["maxAttempts"], 5);
    Ok(())
}

#[test]
fn invalid_version_is_rejected() -> TestResult {
    let path = fixture_path("config/pipeline-config.invalid-version.json");
    let error = load_effective_config_json(&BTreeMap::new(), Some(&path), None)
        .err()
        .ok_or("expected a version error")?;
    assert_eq!(error.code.namespace(), "config");
    Ok(())
}

#[test]
fn toml_fixture_renders_as_toml() -> TestResult {
    let path = fixture_path("config/pipeline-config.valid.toml");
    let rendered = load_effective_config(&BTreeMap::new(), Some(&path), None, ConfigFormat::Toml)?;
    assert!(rendered.contains("[storage]"));
    assert!(rendered.contains("repoPath"));
    Ok(())
}

#[test]
fn invalid_env_bool_fails_validation() -> TestResult {
    let env: BTreeMap<String, String> = load_json_fixture("env/pipeline-env.invalid-bool.json")?;
    let error = validate_env_parsing(&env).err().ok_or("expected an env error")?;
    assert_eq!(error.code.code(), "invalid_env_bool");
    Ok(())
}

fn config_with(enabled: bool) -> Result<ValidatedPipelineConfig, ErrorEnvelope> {
    let mut config = PipelineConfig::default();
    config.storage.repo_path = "/srv/cpl/repos".into();
    config.disk.threshold_enabled = enabled;
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

#[tokio::test]
async fn watermark_report_flags_low_volume() -> TestResult {
    let probe = ScriptedDiskProbe::fixed(DiskUsage {
        total_bytes: 100 * GIB,
        available_bytes: 10 * GIB,
    });
    let report =
        check_watermark_with(&RequestContext::new_request(), &config_with(true)?, &probe).await?;

    assert!(report.low);
    assert!(report.enabled);
    assert_eq!(report.used_percent, 90);
    assert_eq!(report.threshold, "80%");
    assert_eq!(probe.paths(), vec![std::path::PathBuf::from("/srv/cpl/repos")]);
    Ok(())
}

#[tokio::test]
async fn disabled_threshold_still_reports_usage() -> TestResult {
    let probe = ScriptedDiskProbe::fixed(DiskUsage {
        total_bytes: 100 * GIB,
        available_bytes: GIB,
    });
    let report =
        check_watermark_with(&RequestContext::new_request(), &config_with(false)?, &probe).await?;

    assert!(!report.low);
    assert!(!report.enabled);
    assert_eq!(report.used_percent, 99);
    Ok(())
}
