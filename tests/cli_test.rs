//! CLI integration tests using assert_cmd.
//!
//! These tests verify the exit contract of the binary: version printing,
//! failure exit codes, and a clean stdout.

mod common;

use assert_cmd::cargo_bin_cmd;
use common::TestContext;
use raksh_hook::config::{DecryptionConfig, DecryptionEngine};
use std::fs;
use std::path::PathBuf;

/// Every `hook.log` written under `tmp`.
fn log_files(tmp: &std::path::Path) -> Vec<PathBuf> {
    fs::read_dir(tmp)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("hooklog"))
        .map(|e| e.path().join("hook.log"))
        .filter(|p| p.exists())
        .collect()
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.arg("-version")
        .assert()
        .success()
        .stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_double_dash_version_flag() {
    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.arg("--version").assert().success();
}

#[test]
fn test_cli_invalid_flag() {
    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.arg("--nonexistent-flag").assert().failure();
}

#[test]
fn test_cli_start_disabled() {
    let ctx = TestContext::new().unwrap();
    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.arg("-s=false")
        .env("TMPDIR", &ctx.temp_path)
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
}

#[test]
fn test_cli_malformed_state() {
    let ctx = TestContext::new().unwrap();
    let config = ctx.write_hook_config().unwrap();

    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.env("RAKSH_HOOK_CONFIG", &config)
        .env("TMPDIR", &ctx.temp_path)
        .write_stdin("not json")
        .assert()
        .failure()
        .code(1)
        .stdout(predicates::str::is_empty());

    let logs = log_files(&ctx.temp_path);
    assert_eq!(logs.len(), 1);
    let log = fs::read_to_string(&logs[0]).unwrap();
    assert!(log.contains("MalformedState"));
}

#[test]
fn test_cli_mount_not_found() {
    let ctx = TestContext::new().unwrap();
    let config = ctx.write_hook_config().unwrap();
    ctx.write_bundle_config(&[("/s", "/etc/other")]).unwrap();

    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.env("RAKSH_HOOK_CONFIG", &config)
        .env("TMPDIR", &ctx.temp_path)
        .write_stdin(ctx.state_json(1234, "c1"))
        .assert()
        .failure()
        .stdout(predicates::str::is_empty());

    assert!(!ctx.staging_dir().exists());
    let log = fs::read_to_string(&log_files(&ctx.temp_path)[0]).unwrap();
    assert!(log.contains("MountNotFound"));
    assert!(!log.contains("modifying bind mount"));
}

#[test]
fn test_cli_secret_missing() {
    let ctx = TestContext::new().unwrap();
    let config = ctx.write_hook_config().unwrap();
    let source = ctx.source();
    ctx.write_bundle_config(&[(source.to_str().unwrap(), "/etc/raksh")])
        .unwrap();

    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.env("RAKSH_HOOK_CONFIG", &config)
        .env("TMPDIR", &ctx.temp_path)
        .write_stdin(ctx.state_json(1234, "c1"))
        .assert()
        .failure();

    assert!(!ctx.staging_dir().exists());
    let log = fs::read_to_string(&log_files(&ctx.temp_path)[0]).unwrap();
    assert!(log.contains("SecretUnreadable"));
}

#[test]
fn test_cli_missing_explicit_config() {
    let ctx = TestContext::new().unwrap();

    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.env("RAKSH_HOOK_CONFIG", ctx.temp_path.join("absent.yaml"))
        .env("TMPDIR", &ctx.temp_path)
        .write_stdin(ctx.state_json(1234, "c1"))
        .assert()
        .failure();
}

#[test]
fn test_cli_version_flag_with_value() {
    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.arg("-version=true")
        .assert()
        .success()
        .stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_state_decoded_before_age_key() {
    let ctx = TestContext::new().unwrap();
    let mut config = ctx.hook_config();
    config.decryption = DecryptionConfig {
        engine: DecryptionEngine::Age,
        identity_file: Some(ctx.temp_path.join("absent-key.txt")),
    };
    let config_path = ctx.temp_path.join("hook.yaml");
    fs::write(&config_path, serde_yaml::to_string(&config).unwrap()).unwrap();

    let mut cmd = cargo_bin_cmd!("raksh-hook");
    cmd.env("RAKSH_HOOK_CONFIG", &config_path)
        .env("TMPDIR", &ctx.temp_path)
        .write_stdin("not json")
        .assert()
        .failure()
        .code(1);

    let log = fs::read_to_string(&log_files(&ctx.temp_path)[0]).unwrap();
    assert!(log.contains("MalformedState"));
    assert!(!log.contains("identity file"));
}
