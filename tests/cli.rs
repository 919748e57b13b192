use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bin() -> Command {
    Command::cargo_bin("github-rate-limit-exporter").unwrap()
}

#[test]
fn version_flag_prints_and_exits() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("github-rate-limit-exporter "));
}

#[test]
fn missing_config_file_fails_fast() {
    bin()
        .args(["--log-level", "warn", "--config", "/nonexistent/config.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn unsupported_format_fails_fast() {
    let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    f.write_all(b"{}").unwrap();
    bin()
        .args(["--log-level", "warn", "--config"])
        .arg(f.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported config file format"));
}

#[test]
fn config_without_users_fails_fast() {
    let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    f.write_all(b"listen_addr: \":9101\"\n").unwrap();
    bin()
        .args(["--log-level", "warn", "--config"])
        .arg(f.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no users defined in config"));
}
