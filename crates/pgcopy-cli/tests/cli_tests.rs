//! CLI integration tests for pgcopy.
//!
//! These tests verify command-line argument parsing, help output,
//! dry-run output and exit codes for error conditions. None of them
//! needs a running database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pgcopy binary.
fn cmd() -> Command {
    Command::cargo_bin("pgcopy").unwrap()
}

/// Write `yaml` to a temporary config file.
fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

const TABLES_ONLY: &str = r#"
schemas:
  - name: public
    tables:
      - name: users
        ignore: [password_hash]
        transform:
          email: hash
        filter: "active = true"
        truncate: true
      - name: orders
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_lists_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pgcopy"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_log_format_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_file_flag_is_required() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--file", "/nonexistent/pgcopy.yaml"])
        .assert()
        .code(7); // EXIT_IO_ERROR - file not found
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("schemas: [\n");
    cmd()
        .arg("--file")
        .arg(file.path())
        .assert()
        .code(1); // EXIT_CONFIG_ERROR
}

#[test]
fn test_config_without_schemas_exits_with_code_1() {
    let file = config_file("source:\n  host: localhost\n  database: app\n  username: me\n");
    cmd()
        .arg("--file")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no schemas defined"));
}

#[test]
fn test_ignored_and_transformed_column_exits_with_code_1() {
    let file = config_file(
        "schemas:\n  - name: public\n    tables:\n      - name: users\n        ignore: [email]\n        transform:\n          email: hash\n",
    );
    cmd()
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot be both ignored and transformed"));
}

#[test]
fn test_missing_connection_exits_with_code_1() {
    let file = config_file(TABLES_ONLY);
    cmd()
        .arg("--file")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "source database connection not provided",
        ));
}

// =============================================================================
// Dry Run Tests
// =============================================================================

#[test]
fn test_dry_run_lists_tables_without_connecting() {
    let file = config_file(TABLES_ONLY);
    cmd()
        .arg("--file")
        .arg(file.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run: 2 tables"))
        .stdout(predicate::str::contains("public.users"))
        .stdout(predicate::str::contains("Ignore: password_hash"))
        .stdout(predicate::str::contains("Transform: email"))
        .stdout(predicate::str::contains("Filter: active = true"))
        .stdout(predicate::str::contains("public.orders"));
}

#[test]
fn test_dry_run_json_output() {
    let file = config_file(TABLES_ONLY);
    let output = cmd()
        .arg("--file")
        .arg(file.path())
        .args(["--dry-run", "--output-json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let plans: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plans[0]["table"], "users");
    assert_eq!(plans[0]["truncate"], true);
    assert_eq!(plans[1]["table"], "orders");
    assert!(plans[1]["filter"].is_null());
}
