//! Integration tests for the `sigtap-sim` binary.

use std::process::Command;
use tempfile::TempDir;

fn sim_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sigtap-sim"))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = sim_bin()
        .args(args)
        .arg("--json")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sigtap-sim");
    assert!(
        output.status.success(),
        "sigtap-sim {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report")
}

#[test]
fn cli_help_lists_options() {
    let output = sim_bin().arg("--help").output().expect("failed to run sigtap-sim --help");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--config", "--frames", "--mode", "--gain", "--json"] {
        assert!(stdout.contains(flag), "help should mention {flag}");
    }
}

#[test]
fn cli_default_call_processes_uplink() {
    let report = run_json(&["--frames", "10", "--gain", "0.5"]);

    assert_eq!(report["app"], "gain");
    assert_eq!(report["buffer_mode"], "Uplink");
    assert_eq!(report["mode"], "on");
    assert_eq!(report["frames_delivered"], 10);
    assert_eq!(report["final_state"], "Destructing");

    let input = report["input_peak"].as_i64().unwrap();
    let output = report["output_peak"].as_i64().unwrap();
    assert!(output <= input / 2 + 1, "input {input}, output {output}");
}

#[test]
fn cli_mode_off_leaves_audio_untouched() {
    let report = run_json(&["--frames", "5", "--gain", "0.1", "--mode", "off"]);

    assert_eq!(report["mode"], "off");
    assert_eq!(report["frames_altered"], 0);
    assert_eq!(report["input_peak"], report["output_peak"]);
}

#[test]
fn cli_both_links_doubles_frames() {
    let report = run_json(&["--frames", "4", "--link", "both"]);
    assert_eq!(report["buffer_mode"], "BothLinks");
    assert_eq!(report["frames_delivered"], 8);
}

#[test]
fn cli_config_file_selects_downlink() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod_quiet.toml");
    std::fs::write(
        &path,
        "name = \"mod_quiet\"\nversion = \"2.0\"\n\n[processing]\nworking_channel = \"downlink\"\nallowed_sample_rates = [8000]\n",
    )
    .unwrap();

    let report = run_json(&["--config", path.to_str().unwrap(), "--frames", "3"]);
    assert_eq!(report["app"], "quiet");
    assert_eq!(report["buffer_mode"], "Downlink");
    assert_eq!(report["frames_delivered"], 3);
}

#[test]
fn cli_disallowed_rate_reports_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod_wide.toml");
    std::fs::write(
        &path,
        "name = \"mod_wide\"\n\n[processing]\nworking_channel = \"uplink\"\nallowed_sample_rates = [16000]\n",
    )
    .unwrap();

    let report = run_json(&["--config", path.to_str().unwrap(), "--sample-rate", "8000"]);
    assert_eq!(report["attached_state"], "Failed");
    assert_eq!(report["frames_delivered"], 0);
}

#[test]
fn cli_missing_config_fails() {
    let output = sim_bin()
        .args(["--config", "/nonexistent/sigtap/mod_nothing.toml"])
        .output()
        .expect("failed to run sigtap-sim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "got: {stderr}");
}

#[test]
fn cli_invalid_config_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod_bad.toml");
    std::fs::write(&path, "name = \"mod_bad\"\n[processing]\nallowed_sample_rates = [0]\n").unwrap();

    let output = sim_bin()
        .args(["--config", path.to_str().unwrap()])
        .output()
        .expect("failed to run sigtap-sim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("validation failed"), "got: {stderr}");
}
