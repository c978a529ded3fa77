//! Tests of the `cockpit` binary's argument handling.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_flags() {
    Command::cargo_bin("cockpit")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--database"));
}

#[test]
fn test_print_config_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("cockpit.toml");
    std::fs::write(&config, "[runner]\nsubscriber_capacity = 3\n").unwrap();

    Command::cargo_bin("cockpit")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--bind", "0.0.0.0:9000", "--print-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"bind = "0.0.0.0:9000""#))
        .stdout(predicate::str::contains("subscriber_capacity = 3"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("cockpit.toml");
    std::fs::write(&config, "[server]\nmax_page_size = 0\n").unwrap();

    Command::cargo_bin("cockpit")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("--print-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_page_size"));
}
