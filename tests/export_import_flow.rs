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

#[test]
fn export_reset_import_restores_portfolio_and_settings() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["reset", "--empty"]);
    run_ok_out(
        &home,
        &["holding", "add", "--name", "Gamma", "--quantity", "3", "--price", "50", "--year", "2024"],
    );
    run_ok_out(&home, &["sim", "set", "--contribution", "123", "--end-year", "2040"]);
    run_ok_out(&home, &["actual", "set", "2025-01", "999"]);

    let file = home.path().join("backup.json");
    let out = run_ok_out(&home, &["export", "--out", file.to_str().expect("path")]);
    assert!(out.starts_with("exported\t"));

    let raw = std::fs::read_to_string(&file).expect("export file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["portfolio"][0]["name"], "Gamma");
    assert_eq!(json["simSettings"]["monthlyContribution"], 123.0);
    assert!(json["portfolio"][0]["yearlyDividends"]["2024"].is_array());
    assert!(json.get("history").is_none());

    run_ok_out(&home, &["reset"]);
    let out = run_ok_out(&home, &["import", file.to_str().expect("path")]);
    assert_eq!(out.trim(), "imported\t1 holdings, 5 accounts");

    let list = run_ok_out(&home, &["holding", "list", "--year", "2024"]);
    assert_eq!(list.lines().count(), 2);
    assert!(list.contains("\tGamma\t"));
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains("monthly_contribution\t123.00"));
    assert!(show.contains("end_year\t2040"));
}

#[test]
fn export_to_stdout_is_pretty_json() {
    let home = tempfile::tempdir().expect("tempdir");
    let out = run_ok_out(&home, &["export"]);
    let json: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(json["portfolio"].as_array().map(Vec::len), Some(7));
    assert!(out.contains("\n  \"simSettings\""));
}

#[test]
fn malformed_import_leaves_state_unchanged() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok_out(&home, &["reset", "--empty"]);
    run_ok_out(&home, &["holding", "add", "--name", "Stay"]);

    let bad = home.path().join("bad.json");
    std::fs::write(&bad, r#"{"portfolio": []}"#).expect("write");

    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(["import", bad.to_str().expect("path")]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("simSettings"));

    std::fs::write(&bad, "not json at all").expect("write");
    let mut cmd = divfolio_cmd();
    cmd.env("DIVFOLIO_HOME", home.path());
    cmd.args(["import", bad.to_str().expect("path")]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("malformed JSON"));

    let list = run_ok_out(&home, &["holding", "list"]);
    assert!(list.contains("\tStay\t"));
}

#[test]
fn import_accepts_legacy_accounts_without_ids() {
    let home = tempfile::tempdir().expect("tempdir");
    let file = home.path().join("legacy.json");
    std::fs::write(
        &file,
        r#"{
            "portfolio": [
                {"id": "h1", "name": "Old", "quantity": 1, "currentPrice": 10,
                 "monthlyDividends": [1,1,1,1,1,1,1,1,1,1,1,1],
                 "yearlyDividends": {"2023": [2, 2]}}
            ],
            "simSettings": {
                "scenarios": {"conservative": 3, "moderate": 6, "aggressive": 9},
                "accounts": [{"name": "Only", "balance": 42}],
                "monthlyContribution": 0,
                "startYear": 2024,
                "endYear": 2030
            }
        }"#,
    )
    .expect("write");

    run_ok_out(&home, &["import", file.to_str().expect("path")]);
    let show = run_ok_out(&home, &["sim", "show"]);
    assert!(show.contains("start\t2024-01"));
    assert!(show.contains("starting_balance\t42.00"));
    assert!(show.contains("\tOnly\t42.00"));

    let summary = run_ok_out(&home, &["summary", "--year", "2023"]);
    assert!(summary.contains("annual_dividend\t4.00"));
}

#[test]
fn import_of_monthly_only_export_counts_for_the_current_year() {
    let home = tempfile::tempdir().expect("tempdir");
    let file = home.path().join("monthly-only.json");
    std::fs::write(
        &file,
        r#"{
            "portfolio": [
                {"id": "old-1", "name": "Old", "quantity": 10, "currentPrice": 10,
                 "monthlyDividends": [1,1,1,1,1,1,1,1,1,1,1,1]}
            ],
            "simSettings": {
                "scenarios": {"conservative": 5, "moderate": 8, "aggressive": 12},
                "startYear": 2025,
                "endYear": 2030
            }
        }"#,
    )
    .expect("write");

    let out = run_ok_out(&home, &["import", file.to_str().expect("path")]);
    assert!(out.starts_with("imported\t1 holdings"));

    let summary = run_ok_out(&home, &["summary"]);
    assert!(summary.contains("annual_dividend\t12.00"), "{summary}");
    assert!(summary.contains("yield\t12.00%"), "{summary}");

    let yearly = run_ok_out(&home, &["stats", "yearly"]);
    let year_rows = yearly
        .lines()
        .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .count();
    assert_eq!(year_rows, 1, "{yearly}");
}
