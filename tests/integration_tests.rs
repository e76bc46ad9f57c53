mod common;

use common::{CommandOutput, TestContext};
use std::fs;

#[test]
fn test_help_and_version() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .arg("--help")
        .output()
        .expect("Failed to run pvm")
        .into();

    output
        .assert_success()
        .assert_stdout_contains("A PHP version manager for Windows release builds")
        .assert_stdout_contains("Usage: pvm");

    let output: CommandOutput = ctx
        .cmd()
        .arg("version")
        .output()
        .expect("Failed to run pvm")
        .into();

    output.assert_success().assert_stdout_contains("pvm");
}

#[test]
fn test_config_show_formats() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["config", "set", "timeout-secs", "42"])
        .output()
        .expect("Failed to set config");

    let output: CommandOutput = ctx
        .cmd()
        .args(["config", "show", "--format", "json"])
        .output()
        .expect("Failed to run pvm")
        .into();

    output.assert_success();
    let value: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("Output was not valid JSON");
    assert_eq!(value["timeout_secs"], 42);
    output.assert_stdout_contains("\"home_dir\":");

    let output: CommandOutput = ctx
        .cmd()
        .args(["config", "show", "--format", "yaml"])
        .output()
        .expect("Failed to run pvm")
        .into();

    output.assert_success();
    let _: serde_yaml::Value =
        serde_yaml::from_str(&output.stdout).expect("Output was not valid YAML");
    output.assert_stdout_contains("release_url:");
}

#[test]
fn test_config_set_get_unset() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["config", "set", "spawn-shell=true"])
        .output()
        .expect("Failed to set config");
    assert!(ctx.config_path.is_file());

    let output: CommandOutput = ctx
        .cmd()
        .args(["config", "get", "spawn_shell"])
        .output()
        .expect("Failed to get config")
        .into();
    output.assert_success().assert_stdout_contains("true");

    ctx.cmd()
        .args(["config", "unset", "spawn-shell"])
        .output()
        .expect("Failed to unset config");

    let output: CommandOutput = ctx
        .cmd()
        .args(["config", "get", "spawn-shell"])
        .output()
        .expect("Failed to get config")
        .into();
    output.assert_success().assert_stdout_contains("false");

    let output: CommandOutput = ctx
        .cmd()
        .args(["config", "set", "colour", "blue"])
        .output()
        .expect("Failed to run pvm")
        .into();
    output
        .assert_failure()
        .assert_stderr_contains("not a valid configuration setting");
}

#[test]
fn test_list_empty_and_corrupt_registry() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .arg("list")
        .output()
        .expect("Failed to run pvm")
        .into();
    output
        .assert_success()
        .assert_stdout_contains("No PHP versions installed yet.");

    fs::write(ctx.versions_dir().join("versions.json"), "{broken").unwrap();
    let output: CommandOutput = ctx
        .cmd()
        .arg("list")
        .output()
        .expect("Failed to run pvm")
        .into();
    output
        .assert_success()
        .assert_stdout_contains("No PHP versions installed yet.");
}

#[test]
fn test_list_shows_registry_entries() {
    let ctx = TestContext::new();
    ctx.fake_version("php-8.2.4-Win32-vc15-x64");
    fs::write(
        ctx.versions_dir().join("versions.json"),
        r#"{"8.2": "php-8.2.4-Win32-vc15-x64", "7.4": "php-7.4.33-Win32-vc15-x64"}"#,
    )
    .unwrap();

    let output: CommandOutput = ctx
        .cmd()
        .arg("list")
        .output()
        .expect("Failed to run pvm")
        .into();

    output
        .assert_success()
        .assert_stdout_contains("8.2 => php-8.2.4-Win32-vc15-x64")
        .assert_stdout_contains("7.4 => php-7.4.33-Win32-vc15-x64  (missing)");
}

#[test]
fn test_install_without_index_fails() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["-y", "install", "8.2"])
        .output()
        .expect("Failed to run pvm")
        .into();

    output
        .assert_failure()
        .assert_stderr_contains("Could not fetch the release index");
    assert!(!ctx.versions_dir().join("versions.json").exists());
}

#[test]
fn test_current_with_nothing_active() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .env("PATH", "")
        .arg("current")
        .output()
        .expect("Failed to run pvm")
        .into();

    output
        .assert_success()
        .assert_stdout_contains("No PHP version is active");
}
