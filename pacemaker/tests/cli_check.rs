//! CLI tests for the `pacemaker` binary.
//!
//! Spawns the binary and verifies exit codes and output for the
//! non-interactive commands.

use std::process::Command;

use pacemaker::exit_codes;
use pacemaker::test_support::{TestHome, record};

#[test]
fn check_with_collapsed_focus_exits_with_intervention_code() {
    let status = Command::new(env!("CARGO_BIN_EXE_pacemaker"))
        .args(["check", "--mood", "0.8", "--focus", "0.1", "--stamina", "0.8"])
        .status()
        .expect("pacemaker check");

    assert_eq!(status.code(), Some(exit_codes::INTERVENTION_REQUIRED));
}

#[test]
fn check_with_healthy_vitals_exits_ok() {
    let status = Command::new(env!("CARGO_BIN_EXE_pacemaker"))
        .args(["check", "--mood", "0.8", "--focus", "0.8", "--stamina", "0.8"])
        .status()
        .expect("pacemaker check");

    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn budget_prints_final_value_first() {
    let home = TestHome::new().expect("home");
    let output = Command::new(env!("CARGO_BIN_EXE_pacemaker"))
        .arg("--config")
        .arg(home.config_path())
        .args(["budget", "--profile", "SIMPLE_QUESTION"])
        .output()
        .expect("pacemaker budget");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let first = stdout.lines().next().expect("budget line");
    let budget: u32 = first.parse().expect("numeric budget");
    assert!(budget >= 2);
}

#[test]
fn stats_lists_recorded_profiles() {
    let home = TestHome::new().expect("home");
    let lines: Vec<String> = [record("BUG_FIX", 4, 8, true), record("RESEARCH", 6, 6, false)]
        .iter()
        .map(|r| serde_json::to_string(r).expect("json"))
        .collect();
    std::fs::write(home.log_path(), lines.join("\n")).expect("write log");

    let output = Command::new(env!("CARGO_BIN_EXE_pacemaker"))
        .args(["stats", "--config"])
        .arg(home.config_path())
        .output()
        .expect("pacemaker stats");

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.contains("BUG_FIX\tsessions=1"));
    assert!(stdout.contains("RESEARCH\tsessions=1"));
    assert!(stdout.contains("recommended=unknown"));
}
