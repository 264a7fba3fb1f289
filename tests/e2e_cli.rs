//! CLI end-to-end tests
//!
//! Exercise the mkvpriority binary surface that does not require
//! mkvtoolnix to be installed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn mkvpriority_cmd() -> Command {
    Command::cargo_bin("mkvpriority").unwrap()
}

#[test]
fn no_args_shows_help() {
    let mut cmd = mkvpriority_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    let mut cmd = mkvpriority_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mkvpriority"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_command() {
    let mut cmd = mkvpriority_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mkvpriority"));
}

#[test]
fn check_tools_reports_status() {
    let mut cmd = mkvpriority_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("mkvmerge").and(predicate::str::contains("mkvpropedit")),
    );
}

#[test]
fn run_help_mentions_tag_syntax() {
    let mut cmd = mkvpriority_cmd();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("::TAG"));
}

#[test]
fn serve_help() {
    let mut cmd = mkvpriority_cmd();
    cmd.args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("webhook receiver"));
}

#[test]
fn validate_without_config_uses_defaults() {
    let mut cmd = mkvpriority_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults"));
}

#[test]
fn validate_accepts_a_real_config() {
    let dir = tempdir().unwrap();
    let profile_path = dir.path().join("anime.toml");
    fs::write(
        &profile_path,
        "audio_mode = [\"default\"]\n\n[audio_languages]\njpn = 100\n",
    )
    .unwrap();

    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[server]\nport = 9090\n\n[[profiles]]\npath = \"{}\"\ntag = \"anime\"\n",
            profile_path.display()
        ),
    )
    .unwrap();

    let mut cmd = mkvpriority_cmd();
    cmd.args(["validate", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("anime"));
}

#[test]
fn validate_rejects_malformed_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "[server\nport = nope").unwrap();

    let mut cmd = mkvpriority_cmd();
    cmd.args(["validate", config_path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn run_with_unknown_profile_config_fails() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[[profiles]]\npath = \"/nonexistent/profile.toml\"\n",
    )
    .unwrap();

    let mut cmd = mkvpriority_cmd();
    cmd.args([
        "--config",
        config_path.to_str().unwrap(),
        "run",
        "/nonexistent/file.mkv",
    ])
    .assert()
    .failure();
}
