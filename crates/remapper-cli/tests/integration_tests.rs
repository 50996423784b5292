//! End-to-end tests against the built `remapper` binary, using
//! `CARGO_BIN_EXE_remapper` to invoke it as a subprocess. `doctor` is the
//! only subcommand exercised here since every other path ends in `exec`,
//! replacing the test process itself.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

struct TestContext {
    #[allow(dead_code)]
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join("home");
        std::fs::create_dir_all(&home).expect("failed to create home dir");
        Self { temp_dir, home }
    }

    fn remapper_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_remapper");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", &self.home);
        cmd.env_remove("CONFIG");
        cmd.env_remove("CACHE");
        cmd
    }
}

#[test]
fn help_flag_prints_usage() {
    let ctx = TestContext::new();
    let output = ctx.remapper_cmd().arg("--help").output().expect("failed to run remapper");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:"));
}

#[test]
fn version_flag_prints_version() {
    let ctx = TestContext::new();
    let output = ctx.remapper_cmd().arg("--version").output().expect("failed to run remapper");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("remapper"));
}

#[test]
fn not_enough_arguments_exits_with_usage_error() {
    let ctx = TestContext::new();
    let output = ctx.remapper_cmd().arg("/tmp/target").output().expect("failed to run remapper");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn doctor_reports_resolved_mapping_table() {
    let ctx = TestContext::new();
    let target = ctx.home.join("v1");
    let output = ctx
        .remapper_cmd()
        .arg("doctor")
        .arg(target.to_string_lossy().into_owned())
        .arg("~/.dummy*")
        .output()
        .expect("failed to run remapper doctor");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}, stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("target:"));
    assert!(stdout.contains(".dummy"));
    assert!(stdout.contains("inject env var:"));
}

#[test]
fn doctor_rejects_missing_mappings() {
    let ctx = TestContext::new();
    let output = ctx
        .remapper_cmd()
        .arg("doctor")
        .arg(ctx.home.join("v1").to_string_lossy().into_owned())
        .output()
        .expect("failed to run remapper doctor");
    assert!(!output.status.success());
}
