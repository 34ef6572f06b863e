//! CLI integration tests against the built `cpl` binary.

use clone_pipeline_testkit::fixtures::fixture_path;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

type TestResult = Result<(), Box<dyn Error>>;

fn run_cli(args: &[&str], env: &[(&str, &Path)]) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cpl"));
    command.args(args);
    for (key, _) in std::env::vars() {
        if key.starts_with("CPL_") || key == "RUST_LOG" {
            command.env_remove(key);
        }
    }
    for (key, value) in env {
        command.env(key, value);
    }
    command.output()
}

fn temp_dir(label: &str) -> Result<PathBuf, Box<dyn Error>> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let dir = std::env::temp_dir().join(format!("cpl-cli-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn stdout_json(output: &Output) -> Result<serde_json::Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn version_flag_exits_zero() -> TestResult {
    let output = run_cli(&["--version"], &[])?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.starts_with("cpl "));
    Ok(())
}

#[test]
fn config_show_json_normalizes_fixture() -> TestResult {
    let path = fixture_path("config/pipeline-config.valid.json");
    let path = path.to_str().ok_or("non-utf8 fixture path")?;
    let output = run_cli(&["--output", "json", "--config", path, "config", "show"], &[])?;

    assert!(output.status.success());
    let value = stdout_json(&output)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["effectiveConfig"]["storage"]["repoPath"], "/var/lib/cpl/repos");
    assert_eq!(value["effectiveConfig"]["disk"]["watermarkLow"], "90%");
    Ok(())
}

#[test]
fn config_check_rejects_unknown_version() -> TestResult {
    let path = fixture_path("config/pipeline-config.invalid-version.json");
    let path = path.to_str().ok_or("non-utf8 fixture path")?;
    let output = run_cli(&["--quiet", "config", "check", "--config", path], &[])?;

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("status: error\n"));
    assert!(stdout.contains("code: config:"));
    Ok(())
}

#[test]
fn config_schema_describes_clone_requests() -> TestResult {
    let output = run_cli(&["config", "schema"], &[])?;
    assert!(output.status.success());
    let value = stdout_json(&output)?;
    assert!(value["properties"]["url"].is_object());
    assert!(value["properties"]["timeoutMs"].is_object());
    Ok(())
}

#[test]
fn clone_rejects_local_paths_before_enqueue() -> TestResult {
    let repos = temp_dir("reject")?;
    let output = run_cli(
        &["--output", "json", "clone", "/home/me/widgets"],
        &[("CPL_STORAGE_REPO_PATH", repos.as_path())],
    )?;

    assert_eq!(output.status.code(), Some(2));
    let value = stdout_json(&output)?;
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["kind"], "expected");
    assert_eq!(std::fs::read_dir(&repos)?.count(), 0);
    Ok(())
}

#[test]
fn status_of_unknown_repository_is_not_found() -> TestResult {
    let status = temp_dir("status-missing")?;
    let output = run_cli(
        &["status", "https://github.com/acme/widgets.git"],
        &[("CPL_STORAGE_STATUS_PATH", status.as_path())],
    )?;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8(output.stdout)?.contains("code: core:not_found"));
    Ok(())
}

#[test]
fn status_reads_stored_record() -> TestResult {
    let status = temp_dir("status-read")?;
    let document = status.join("github.com").join("acme").join("widgets.json");
    std::fs::create_dir_all(document.parent().ok_or("no parent")?)?;
    let record = serde_json::json!({
        "uri": "github.com/acme/widgets",
        "url": "https://github.com/acme/widgets.git",
        "defaultBranch": "main",
        "headRevision": "4b825dc642cb6eb9a060e54bf8d69288fbee4904",
        "cloneStatus": {
            "progress": 100,
            "phase": "cloned",
            "revision": "4b825dc642cb6eb9a060e54bf8d69288fbee4904",
            "updatedAtMs": 1_700_000_000_000_u64,
        },
        "cancelled": false,
    });
    std::fs::write(&document, serde_json::to_vec_pretty(&record)?)?;

    let output = run_cli(
        &["status", "https://github.com/acme/widgets.git"],
        &[("CPL_STORAGE_STATUS_PATH", status.as_path())],
    )?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("phase: cloned\n"));
    assert!(stdout.contains("progress: 100\n"));
    assert!(stdout.contains("defaultBranch: main\n"));
    Ok(())
}

#[test]
fn watermark_reports_usage_for_repo_root() -> TestResult {
    let repos = temp_dir("watermark")?;
    let output = run_cli(
        &["--output", "json", "watermark"],
        &[("CPL_STORAGE_REPO_PATH", repos.as_path())],
    )?;

    assert!(output.status.success());
    let value = stdout_json(&output)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["watermark"]["threshold"], "80%");
    assert!(value["watermark"]["totalBytes"].as_u64().is_some_and(|total| total > 0));
    assert!(value["watermark"]["low"].is_boolean());
    Ok(())
}
