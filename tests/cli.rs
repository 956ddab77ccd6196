//! CLI tests for kodegen_bundler_wheels.
//!
//! These cover the paths that finish before any container engine call:
//! target selection, listing, configuration and argument validation.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn wheels_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("kodegen_bundler_wheels");
    cmd.env_remove("WHEEL_BUILD_ENGINE");
    cmd
}

#[test]
fn unknown_python_exits_with_one() {
    wheels_cmd()
        .args(["--pythons", "39"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No targets"));
}

#[test]
fn unknown_platform_exits_with_one() {
    wheels_cmd()
        .args(["--platforms", "windows", "--list"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn list_prints_selected_target() {
    wheels_cmd()
        .args(["--platforms", "ubuntu", "--pythons", "36", "--list"])
        .assert()
        .success()
        .stdout("36\tubuntu\t18.04\tbionic\n");
}

#[test]
fn list_defaults_to_full_matrix() {
    let output = wheels_cmd().arg("--list").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let aliases: Vec<_> = stdout
        .lines()
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .map(|fields| format!("{}-py{}", fields[3], fields[0]))
        .collect();
    assert_eq!(aliases, ["bionic-py36", "bionic-py37", "bionic-py38", "focal-py38"]);
}

#[test]
fn config_targets_replace_matrix() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("wheels.toml");
    std::fs::write(
        &config,
        r#"
[[targets]]
python = "310"
platform = "ubuntu"
platform_version = "22.04"
alias = "jammy"
"#,
    )
    .unwrap();

    wheels_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--list")
        .assert()
        .success()
        .stdout("310\tubuntu\t22.04\tjammy\n");
}

#[test]
fn invalid_config_exits_with_one() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("wheels.toml");
    std::fs::write(&config, "unknown_key = 1\n").unwrap();

    wheels_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--list")
        .assert()
        .code(1);
}

#[test]
fn empty_filter_entry_is_rejected() {
    wheels_cmd()
        .args(["--pythons", "36,", "--list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("empty entry"));
}

#[test]
fn missing_engine_is_reported() {
    wheels_cmd()
        .args(["--engine", "definitely-not-a-container-engine", "--pythons", "36"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Container engine not found"));
}
