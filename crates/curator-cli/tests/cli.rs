//! CLI tests for the curator command
//!
//! Argument parsing plus one end-to-end import over a real tempdir.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the curator binary
fn curator() -> Command {
    Command::cargo_bin("curator").expect("Failed to find curator binary")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    curator()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("reimport"));
}

#[test]
fn test_version_flag() {
    curator()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("curator"));
}

#[test]
fn test_global_options_in_help() {
    curator()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--library"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn test_import_requires_target() {
    curator().arg("import").assert().failure();
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_import_then_status() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("assets");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("a.png"), b"pixels").unwrap();

    curator()
        .arg("import")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added"));

    // The sidecar and library artifact exist now.
    assert!(target.join("a.png.meta").exists());
    assert!(dir.path().join("library").exists());

    // A second import sees no changes.
    curator()
        .arg("import")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 added"))
        .stdout(predicate::str::contains("1 unchanged"));

    curator()
        .arg("status")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 tracked"));
}

#[test]
fn test_import_missing_target_fails() {
    curator()
        .arg("import")
        .arg("/definitely/not/here")
        .assert()
        .failure();
}
