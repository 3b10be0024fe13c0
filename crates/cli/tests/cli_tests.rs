//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("monitoring agent"),
        "Should show app description"
    );
    assert!(stdout.contains("scan"), "Should show scan command");
    assert!(stdout.contains("accounts"), "Should show accounts command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("agentcov"), "Should show binary name");
}

/// Test scan subcommand help
#[test]
fn test_scan_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "scan", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Scan help should succeed");
    assert!(
        stdout.contains("--current-sub-account-only"),
        "Should show single-account option"
    );
    assert!(
        stdout.contains("--statistics"),
        "Should show statistics option"
    );
    assert!(
        stdout.contains("--lookback-days"),
        "Should show lookback option"
    );
}

/// Test credential options and env fallbacks
#[test]
fn test_credential_options() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "scan", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--account"), "Should show account option");
    assert!(stdout.contains("--api-key"), "Should show api-key option");
    assert!(
        stdout.contains("--api-secret"),
        "Should show api-secret option"
    );
    assert!(stdout.contains("--profile"), "Should show profile option");
    assert!(stdout.contains("LW_ACCOUNT"), "Should show env var");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "scan", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("csv"), "Should show csv format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = Command::new("cargo")
        .args(["run", "-p", "coverage-cli", "--", "invalid-command"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test that mixing a profile with inline credentials is rejected
#[test]
fn test_profile_with_inline_credentials_rejected() {
    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "coverage-cli",
            "--",
            "scan",
            "--profile",
            "default",
            "--api-key",
            "KEY",
        ])
        .env_remove("LW_ACCOUNT")
        .env_remove("LW_API_KEY")
        .env_remove("LW_API_SECRET")
        .env_remove("LW_PROFILE")
        .output()
        .expect("Failed to execute command");

    assert!(
        !output.status.success(),
        "Profile plus inline credentials should fail"
    );
}

/// Test that incomplete inline credentials are rejected
#[test]
fn test_incomplete_inline_credentials_rejected() {
    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "coverage-cli",
            "--",
            "accounts",
            "--account",
            "mytenant",
        ])
        .env_remove("LW_ACCOUNT")
        .env_remove("LW_API_KEY")
        .env_remove("LW_API_SECRET")
        .env_remove("LW_PROFILE")
        .output()
        .expect("Failed to execute command");

    assert!(
        !output.status.success(),
        "Account without key and secret should fail"
    );
}
