//! End-to-end tests for the `fkeeper` binary, limited to paths that
//! need no live remote: argument parsing, config validation, and the
//! staging tier.

use assert_cmd::Command;
use predicates::prelude::*;

fn fkeeper() -> Command {
    Command::cargo_bin("fkeeper").expect("binary builds")
}

fn write_config(dir: &std::path::Path, staging: &std::path::Path) -> std::path::PathBuf {
    let config = format!(
        r#"
source_host = "forge-test"
target_env = "production"

[[tier]]
name = "local"
endpoint = "{staging}"
mode = "mutable-local"
credential_path = "{staging}/local.cred"
max_snapshot_age_hours = 26

[[tier]]
name = "offsite"
endpoint = "ssh://backup@box.invalid/./repo"
mode = "append-only-remote"
credential_path = "{staging}/offsite.cred"
max_snapshot_age_hours = 26
"#,
        staging = staging.display()
    );
    let path = dir.join("forgekeeper.toml");
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn help_lists_every_subcommand() {
    fkeeper()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("prune"))
        .stdout(predicate::str::contains("risk"))
        .stdout(predicate::str::contains("drill"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn missing_config_file_exits_with_config_code() {
    fkeeper()
        .args(["--config", "/nonexistent/forgekeeper.toml", "status"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read config"));
}

#[test]
fn invalid_config_lists_problems_and_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forgekeeper.toml");
    std::fs::write(
        &path,
        r#"
source_host = ""
target_env = "production"
"#,
    )
    .unwrap();

    fkeeper()
        .args(["--config", path.to_str().unwrap(), "status"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source_host is empty"))
        .stderr(predicate::str::contains("no [[tier]] entries"));
}

#[test]
fn prune_dry_run_on_staging_reports_without_deleting() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "--output", "json"])
        .args(["--quiet", "prune", "--tier", "local", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dry_run\": true"));
}

#[test]
fn prune_unknown_tier_names_the_configured_ones() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "prune"])
        .args(["--tier", "nope", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no tier named 'nope'"))
        .stderr(predicate::str::contains("local, offsite"));
}

#[test]
fn remote_prune_without_admin_credential_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "prune"])
        .args(["--tier", "offsite"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--admin-credential"));
}

#[test]
fn risk_scores_indicators_without_touching_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "--output", "json"])
        .args(["--quiet", "risk"])
        .args(["-i", "mass-file-rename:high", "-i", "entropy-spike:medium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\": 75"));
}

#[test]
fn malformed_indicator_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "risk"])
        .args(["-i", "badly-formed"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NAME:SEVERITY"));
}

#[test]
fn restore_confirmation_must_echo_the_snapshot_id() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    // Bad snapshot id fails in parsing, before any tier is touched.
    fkeeper()
        .args(["--config", config.to_str().unwrap(), "restore"])
        .args(["not-a-snapshot-id!", "--confirm", "not-a-snapshot-id!"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid snapshot"));
}

#[test]
fn restore_refuses_yes_combined_with_confirm() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "restore", "latest"])
        .args(["--yes", "--confirm", "forge-test-20260830T020000Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn quiet_suppresses_pretty_output_but_not_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    // Pretty output is informational; quiet drops it entirely.
    fkeeper()
        .args(["--config", config.to_str().unwrap(), "--quiet"])
        .args(["prune", "--tier", "local", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    // Structured output is the result; quiet leaves it alone.
    fkeeper()
        .args(["--config", config.to_str().unwrap(), "--quiet"])
        .args(["--output", "json", "prune", "--tier", "local", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dry_run\": true"));
}

#[test]
fn run_without_artifacts_section_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    let config = write_config(dir.path(), &staging);

    fkeeper()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("[artifacts]"));
}
