//! CLI report integration tests
//!
//! Runs the built binary against results files on disk.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn write_results(dir: &TempDir, name: &str, results: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string(&results).unwrap()).unwrap();
    path
}

#[test]
fn test_cli_report_prints_markdown_for_results_file() {
    let temp_dir = TempDir::new().unwrap();
    let results = write_results(
        &temp_dir,
        "results.json",
        serde_json::json!([
            {
                "displayName": "web",
                "attributePath": "hosts.web",
                "baseRef": "b1",
                "prRef": "h1",
                "diff": "<<< /nix/store/a\n>>> /nix/store/b\n"
            }
        ]),
    );

    let output = Command::new(env!("CARGO_BIN_EXE_flakediff"))
        .args(["report", results.to_str().unwrap()])
        .output()
        .expect("Failed to execute CLI");

    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("<!-- flakediff:web -->"));
    assert!(stdout.contains("<summary>web</summary>"));
    assert!(stdout.contains(">>> /nix/store/b"));
    assert!(stdout.contains("<!-- flakediff-commit:h1 -->"));
}

#[test]
fn test_cli_report_merges_directory_and_honours_budget() {
    let temp_dir = TempDir::new().unwrap();
    write_results(
        &temp_dir,
        "a.json",
        serde_json::json!([{ "displayName": "web", "diff": "x".repeat(500) }]),
    );
    write_results(
        &temp_dir,
        "b.json",
        serde_json::json!([{ "displayName": "db", "diff": "" }]),
    );
    let out_file = temp_dir.path().join("report.md");

    let output = Command::new(env!("CARGO_BIN_EXE_flakediff"))
        .args([
            "report",
            temp_dir.path().to_str().unwrap(),
            "--budget",
            "200",
            "--commit",
            "c0ffee",
            "--output",
            out_file.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute CLI");

    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report = fs::read_to_string(&out_file).unwrap();
    assert!(report.starts_with("<!-- flakediff -->"));
    assert!(report.contains("... (truncated, 500 chars total)"));
    assert!(report.contains("No differences found"));
    assert!(report.contains("Compared at commit c0ffee"));
    assert!(report.find("web").unwrap() < report.find("db").unwrap());
}

#[test]
fn test_cli_report_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.json");

    let output = Command::new(env!("CARGO_BIN_EXE_flakediff"))
        .args(["report", missing.to_str().unwrap()])
        .output()
        .expect("Failed to execute CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: [ERR_ARTIFACT]"), "Stderr: {}", stderr);
}
