use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn divfolio_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("divfolio"))
}

fn cmd_with_home() -> (tempfile::TempDir, Command) {
    let home = tempfile::tempdir().expect("tempdir");
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    (home, cmd)
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) {
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(args);
    cmd.assert().success();
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

#[test]
fn help_lists_top_level_commands() {
    let (_home, mut cmd) = cmd_with_home();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("holding"))
        .stdout(predicate::str::contains("sim"))
        .stdout(predicate::str::contains("remote"));
}

#[test]
fn fresh_home_starts_in_sample_mode() {
    let (home, _cmd) = cmd_with_home();

    let out = run_ok_out(&home, &["holding", "list", "--year", "2025"]);
    let rows: Vec<&str> = out.lines().skip(1).collect();
    assert_eq!(rows.len(), 7, "{out}");
    assert!(rows.iter().all(|r| r.contains("SAMPLE")));

    let years = run_ok_out(&home, &["stats", "yearly"]);
    assert!(years.contains("\n2023\t"));
    assert!(years.contains("\n2025\t"));
    assert!(years.lines().last().unwrap_or("").starts_with("average\t"));
}

#[test]
fn reset_empty_then_reset_restores_sample() {
    let (home, _cmd) = cmd_with_home();

    let out = run_ok_out(&home, &["reset", "--empty"]);
    assert_eq!(out.trim(), "reset\tempty");
    let list = run_ok_out(&home, &["holding", "list"]);
    assert_eq!(list.lines().count(), 1, "{list}");

    run_ok(&home, &["reset"]);
    let list = run_ok_out(&home, &["holding", "list"]);
    assert_eq!(list.lines().count(), 8, "{list}");
}

#[test]
fn default_simulator_settings_are_shown() {
    let (home, _cmd) = cmd_with_home();
    let out = run_ok_out(&home, &["sim", "show"]);

    assert!(out.contains("conservative\t5.00%"));
    assert!(out.contains("moderate\t8.00%"));
    assert!(out.contains("aggressive\t12.00%"));
    assert!(out.contains("monthly_contribution\t1000000.00"));
    assert!(out.contains("start\t2025-01"));
    assert!(out.contains("end_year\t2050"));
    assert!(out.contains("birth_year\t-"));
    assert!(out.contains("latest_actual\t-"));
    assert_eq!(out.lines().filter(|l| l.starts_with("account\t")).count(), 5);
}

#[test]
fn state_survives_between_invocations_in_a_profile_database() {
    let (home, _cmd) = cmd_with_home();
    run_ok(&home, &["reset", "--empty"]);
    run_ok(&home, &["holding", "add", "--name", "Kept", "--year", "2025"]);

    let db = home.path().join("data/profiles/default/divfolio.sqlite3");
    assert!(db.exists());
    assert!(home.path().join("config/config.json").exists());

    let list = run_ok_out(&home, &["holding", "list"]);
    assert!(list.contains("\tKept\t"));
}

#[test]
fn logs_go_to_the_data_dir_not_stdout() {
    let (home, mut cmd) = cmd_with_home();
    cmd.env("RUST_LOG", "divfolio=debug");
    cmd.args(["reset", "--empty"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("applying command").not());

    let log = std::fs::read_to_string(home.path().join("data/divfolio.log")).expect("log file");
    assert!(log.contains("snapshot saved"));
}

#[test]
fn unknown_holding_fails_with_message() {
    let (home, mut cmd) = cmd_with_home();
    run_ok(&home, &["reset", "--empty"]);
    cmd.args(["holding", "remove", "nope"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No holding matches 'nope'"));
}

#[test]
fn snapshot_key_in_an_old_config_is_ignored() {
    let (home, _cmd) = cmd_with_home();
    let cfg_dir = home.path().join("config");
    std::fs::create_dir_all(&cfg_dir).expect("mkdir");
    std::fs::write(
        cfg_dir.join("config.json"),
        r#"{"device_id": "6f1c2a6e-3f4e-4c55-9a10-2b1d7d5b9e01",
            "profile": "default",
            "snapshot_key": "portfolio-state-v0",
            "log_level": "info"}"#,
    )
    .expect("write config");

    run_ok(&home, &["reset", "--empty"]);
    run_ok(&home, &["holding", "add", "--name", "Current"]);

    let status = run_ok_out(&home, &["remote", "status"]);
    let snapshots: Vec<&str> = status
        .lines()
        .filter(|l| l.starts_with("snapshot\t"))
        .collect();
    assert_eq!(snapshots.len(), 1, "{status}");
    assert!(snapshots[0].starts_with("snapshot\tportfolio-state-v1\t"));

    let cfg = std::fs::read_to_string(cfg_dir.join("config.json")).expect("read config");
    assert!(!cfg.contains("portfolio-state-v0"));
}
