use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn divfolio_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("divfolio"))
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

fn run_fail(home: &tempfile::TempDir, args: &[&str], expected_stderr: &str) {
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(args);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains(expected_stderr));
}

/// One projected year at zero growth so every balance is exact.
fn flat_year_home() -> tempfile::TempDir {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["reset", "--empty"]);
    run_ok_out(
        &home,
        &[
            "sim",
            "set",
            "--start",
            "2025-01",
            "--end-year",
            "2025",
            "--contribution",
            "1000",
            "--conservative",
            "0",
            "--moderate",
            "0",
            "--aggressive",
            "0",
        ],
    );
    run_ok_out(&home, &["sim", "account", "balance", "ISA", "5000"]);
    home
}

#[test]
fn projection_starts_from_account_total_and_adds_contributions() {
    let home = flat_year_home();
    let out = run_ok_out(&home, &["sim", "run"]);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(
        lines[0],
        "month\tage\tinvested\tconservative\tmoderate\taggressive\tactual"
    );
    assert_eq!(lines.len(), 13, "{out}");
    assert_eq!(lines[1], "2025.01\t-\t5000.00\t5000.00\t5000.00\t5000.00\t-");
    assert_eq!(lines[2], "2025.02\t-\t6000.00\t6000.00\t6000.00\t6000.00\t-");
    assert_eq!(lines[12], "2025.12\t-\t16000.00\t16000.00\t16000.00\t16000.00\t-");
}

#[test]
fn yearly_view_keeps_december_and_age_follows_birth_year() {
    let home = flat_year_home();
    run_ok_out(&home, &["sim", "set", "--end-year", "2026", "--birth-year", "1990"]);

    let out = run_ok_out(&home, &["sim", "run", "--yearly"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3, "{out}");
    assert!(lines[1].starts_with("2025.12\t35\t16000.00\t"));
    assert!(lines[2].starts_with("2026.12\t36\t28000.00\t"));

    run_ok_out(&home, &["sim", "set", "--clear-birth-year"]);
    let out = run_ok_out(&home, &["sim", "show"]);
    assert!(out.contains("birth_year\t-"));
}

#[test]
fn mid_year_start_and_growth_rates() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["reset", "--empty"]);
    run_ok_out(
        &home,
        &["sim", "set", "--start", "2025-11", "--end-year", "2025", "--contribution", "0"],
    );
    run_ok_out(&home, &["sim", "account", "balance", "General Account", "1000"]);

    let out = run_ok_out(&home, &["sim", "run"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3, "{out}");
    assert_eq!(lines[1], "2025.11\t-\t1000.00\t1000.00\t1000.00\t1000.00\t-");
    // 5/8/12 % annual, compounded monthly.
    assert_eq!(lines[2], "2025.12\t-\t1000.00\t1004.07\t1006.43\t1009.49\t-");
}

#[test]
fn start_after_end_yields_no_rows() {
    let home = flat_year_home();
    run_ok_out(&home, &["sim", "set", "--start", "2030-01"]);
    let out = run_ok_out(&home, &["sim", "run"]);
    assert_eq!(out.lines().count(), 1, "{out}");
}

#[test]
fn invalid_start_month_is_rejected() {
    let home = flat_year_home();
    run_fail(&home, &["sim", "set", "--start", "2025-00"], "Invalid month");
    run_fail(&home, &["sim", "set"], "Nothing to update");
}

#[test]
fn account_lifecycle_by_name() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["reset", "--empty"]);

    let out = run_ok_out(&home, &["sim", "account", "add", "Broker", "--balance", "250"]);
    let id = out.trim().strip_prefix("added\t").expect("added").to_string();

    run_fail(&home, &["sim", "account", "add", "Broker"], "already exists");
    run_fail(
        &home,
        &["sim", "account", "rename", "Broker", "ISA"],
        "already exists",
    );

    run_ok_out(&home, &["sim", "account", "rename", "Broker", "Brokerage"]);
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains(&format!("account\t{id}\tBrokerage\t250.00")));
    assert!(show.contains("starting_balance\t250.00"));

    run_ok_out(&home, &["sim", "account", "remove", &id]);
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(!show.contains("Brokerage"));
    assert!(show.contains("starting_balance\t0.00"));

    run_fail(
        &home,
        &["sim", "account", "balance", "Brokerage", "1"],
        "No account named 'Brokerage'",
    );
}

#[test]
fn negative_inputs_reach_the_projection() {
    let home = flat_year_home();
    run_ok_out(&home, &["sim", "set", "--contribution", "-100"]);

    let out = run_ok_out(&home, &["sim", "run"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[2], "2025.02\t-\t4900.00\t4900.00\t4900.00\t4900.00\t-");
    assert_eq!(lines[12], "2025.12\t-\t3900.00\t3900.00\t3900.00\t3900.00\t-");

    run_ok_out(&home, &["sim", "set", "--conservative", "-2"]);
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains("conservative\t-2.00%"));
    assert!(show.contains("monthly_contribution\t-100.00"));

    run_ok_out(&home, &["sim", "account", "balance", "ISA", "-1"]);
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains("starting_balance\t-1.00"));

    let out = run_ok_out(&home, &["actual", "set", "2025-01", "-5"]);
    assert_eq!(out.trim(), "2025-01\t-5.00");
}

#[test]
fn overlong_projection_is_rejected() {
    let home = flat_year_home();
    run_fail(
        &home,
        &["sim", "set", "--end-year", "2147483647"],
        "exceeds 150 years",
    );
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains("end_year\t2025"));
}
