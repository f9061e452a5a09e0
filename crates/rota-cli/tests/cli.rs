//! CLI integration tests
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | `solve` produced a schedule, `check` found no violations |
//! | 1 | Failure response, violations, or unreadable input |
//!
//! stdout carries only the structured result; logs go to stderr.

use pretty_assertions::assert_eq;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn rota() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rota"));
    // keep the working directory free of a stray rota.toml
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG").env_remove("ROTA_CONFIG");
    cmd
}

fn solve(args: &[&str]) -> Output {
    rota()
        .arg("solve")
        .args(["--seed", "7", "--workers", "2", "--time-limit", "5"])
        .args(args)
        .output()
        .expect("failed to execute rota")
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// =============================================================================
// solve
// =============================================================================

#[test]
fn solve_writes_schedule_json() {
    let output = solve(&[fixture("mornings.json").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let response = json(&output);
    assert_eq!(response["success"], true);
    let assignments = &response["result"]["assignments"];
    assert_eq!(assignments["0"]["morning"], "e2");
    assert_eq!(assignments["1"]["morning"], "e2");
    assert_eq!(assignments["3"]["morning"], "e1");
    assert_eq!(assignments["4"]["morning"], Value::Null);
    assert_eq!(assignments["0"]["night"], Value::Null);
    assert_eq!(response["result"]["stats"]["seed"], 7);
    assert_eq!(response["result"]["stats"]["unfilled_shifts"], 0);
    assert_eq!(response["result"]["unfilled"][0]["reason"], "external");
}

#[test]
fn solve_reads_stdin() {
    let input = std::fs::read_to_string(fixture("mornings.json")).unwrap();
    let mut child = rota()
        .args(["solve", "--seed", "1", "--workers", "1", "--time-limit", "5"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json(&output)["success"], true);
}

#[test]
fn infeasible_request_exits_1() {
    let output = solve(&[fixture("single_full_week.json").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let response = json(&output);
    assert_eq!(response["success"], false);
    assert_eq!(response["result"]["error"], "INFEASIBLE");
}

#[test]
fn missing_field_is_an_exception() {
    let output = solve(&[fixture("missing_week_start.json").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let response = json(&output);
    assert_eq!(response["result"]["error"], "EXCEPTION");
    assert_eq!(response["result"]["message"], "Missing required field: weekStart");
}

#[test]
fn text_format_and_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("schedule.txt");
    let output = solve(&[
        fixture("mornings.json").to_str().unwrap(),
        "--format",
        "text",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("Status: Optimal"));
    assert!(text.contains("0   2025-01-05  e2"));
}

#[test]
fn branch_and_bound_backend_flag() {
    let request = fixture("mornings.json");
    let output = solve(&[request.to_str().unwrap(), "--backend", "branch-and-bound"]);
    assert_eq!(output.status.code(), Some(0));
    let response = json(&output);
    assert_eq!(response["result"]["stats"]["status"], "OPTIMAL");
    assert_eq!(response["result"]["assignments"]["0"]["morning"], "e2");
}

#[test]
fn unknown_backend_rejected_by_the_parser() {
    let output = solve(&[fixture("mornings.json").to_str().unwrap(), "--backend", "simplex"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("rota.toml");
    std::fs::write(&config, "[solver]\nseed = 99\nworkers = 1\n").unwrap();
    let output = rota()
        .args(["solve", "--config", config.to_str().unwrap()])
        .arg(fixture("mornings.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json(&output)["result"]["stats"]["seed"], 99);
}

#[test]
fn bad_config_fails_before_solving() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("rota.toml");
    std::fs::write(&config, "[solver]\nthreads = 4\n").unwrap();
    let output = rota()
        .args(["solve", "--config", config.to_str().unwrap()])
        .arg(fixture("mornings.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn check_accepts_a_solved_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let response = dir.path().join("response.json");
    let output = solve(&[
        fixture("full_week.json").to_str().unwrap(),
        "--output",
        response.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let output = rota()
        .arg("check")
        .arg(fixture("full_week.json"))
        .arg(&response)
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "No violations\n");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn check_reports_violations() {
    let output = rota()
        .arg("check")
        .arg(fixture("full_week.json"))
        .arg(fixture("broken_schedule.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "violation: e3 works night on day 0 and morning on day 1\n1 violations\n"
    );
}

// =============================================================================
// slots
// =============================================================================

#[test]
fn slots_lists_valid_and_pruned() {
    let output = rota().arg("slots").arg(fixture("full_week.json")).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Week of 2025-01-05: 13 slots over 5 days"));
    assert!(stdout.contains("  day 2 2025-01-07  -\n"));
}

#[test]
fn slots_json() {
    let output = rota()
        .args(["slots", "--format", "json"])
        .arg(fixture("mornings.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let value = json(&output);
    assert_eq!(value["weekStart"], "2025-01-05");
    assert_eq!(value["slots"].as_array().unwrap().len(), 6);
    assert_eq!(value["pruned"].as_array().unwrap().len(), 12);
    assert_eq!(value["slots"][5]["date"], "2025-01-10");
}
