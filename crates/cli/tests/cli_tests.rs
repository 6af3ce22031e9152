//! CLI integration tests

use std::process::{Command, Output};

fn hw(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "hirewise-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = hw(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Hirewise"), "Should show app name");
    for command in ["upload", "uploads", "status", "options", "dashboard", "predict", "anomalies"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = hw(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("hw"), "Should show binary name");
}

#[test]
fn test_upload_help() {
    let output = hw(&["upload", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("<FILE>"), "Should show file argument");
    assert!(stdout.contains("--kind"), "Should show kind option");
    assert!(stdout.contains("pipeline"), "Should list kind values");
    assert!(stdout.contains("defaults to hired"), "Should document the CSV default");
    assert!(
        stdout.contains(r#"("Pipeline" or "Final" sheet)"#),
        "Final sheets are pipeline sheets"
    );
}

#[test]
fn test_dashboard_help() {
    let output = hw(&["dashboard", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for option in ["--upload", "--hiring-manager", "--ta-partner", "--country", "--project", "--from", "--to"] {
        assert!(stdout.contains(option), "Should show {} option", option);
    }
}

#[test]
fn test_options_help() {
    let output = hw(&["options", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("<KIND>"), "Should show kind argument");
}

#[test]
fn test_predict_help() {
    let output = hw(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--field"), "Should show field option");
    assert!(stdout.contains("Field=value"), "Should describe field syntax");
    assert!(stdout.contains("--time-to-fill"), "Should show time-to-fill flag");
}

#[test]
fn test_anomalies_help() {
    let output = hw(&["anomalies", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--upload"), "Should show upload option");
}

#[test]
fn test_format_option() {
    let output = hw(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
}

#[test]
fn test_api_url_option() {
    let output = hw(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("HIREWISE_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = hw(&["invalid-command"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Invalid command should fail");
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test invalid sheet kind
#[test]
fn test_invalid_kind() {
    let output = hw(&["dashboard", "final-ish"]);

    assert!(!output.status.success(), "Unknown kind should fail");
}

/// Test missing required argument
#[test]
fn test_missing_argument() {
    let output = hw(&["predict"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing argument should fail");
    assert!(stderr.contains("required"), "Should mention required argument");
}
