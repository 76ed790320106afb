use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn testredundancy() -> Command {
    Command::cargo_bin("testredundancy").expect("binary exists")
}

fn fixture(path: &str) -> String {
    format!("{}/tests/fixtures/{path}", env!("CARGO_MANIFEST_DIR"))
}

// ---------------------------------------------------------------------------
// CLI smoke tests
// ---------------------------------------------------------------------------

#[test]
fn test_help_output() {
    testredundancy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("redundant Go tests"));
}

#[test]
fn test_find_help_lists_flags() {
    testredundancy()
        .args(["find", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--baseline-pattern"))
        .stdout(predicate::str::contains("--always-keep-baseline"));
}

#[test]
fn test_unknown_subcommand_fails() {
    testredundancy().arg("prune").assert().failure();
}

#[test]
fn test_invalid_threshold_config_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("testredundancy.toml"),
        "coverage_threshold = 150.0\n",
    )
    .unwrap();

    testredundancy()
        .args(["-p", temp.path().to_str().unwrap(), "merge", &fixture("profiles/add.out")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("coverage_threshold"));
}

#[test]
fn test_missing_config_file_fails() {
    testredundancy()
        .args(["-c", "/nonexistent/testredundancy.toml", "merge", &fixture("profiles/add.out")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

#[test]
fn test_merge_to_stdout() {
    testredundancy()
        .args(["merge", &fixture("profiles/add.out"), &fixture("profiles/abs.out")])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mode: set\n"))
        .stdout(predicate::str::contains("example.com/calc/calc.go:4.24,6.2 1 1\n"))
        .stdout(predicate::str::contains("example.com/calc/calc.go:13.2,13.10 1 1\n"))
        .stdout(predicate::str::contains("example.com/calc/calc.go:18.21,20.2 1 0\n"))
        .stdout(predicate::str::contains("page.qtpl").not());
}

#[test]
fn test_merge_is_order_independent() {
    let forward = testredundancy()
        .args(["merge", &fixture("profiles/add.out"), &fixture("profiles/abs.out")])
        .output()
        .unwrap();
    let backward = testredundancy()
        .args(["merge", &fixture("profiles/abs.out"), &fixture("profiles/add.out")])
        .output()
        .unwrap();
    assert!(forward.status.success());
    assert_eq!(forward.stdout, backward.stdout);
}

#[test]
fn test_merge_to_file() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("merged.out");

    testredundancy()
        .args([
            "merge",
            &fixture("profiles/add.out"),
            &fixture("profiles/abs.out"),
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let merged = std::fs::read_to_string(&out).unwrap();
    assert_eq!(merged.lines().count(), 6);
}

#[test]
fn test_merge_missing_file_fails() {
    testredundancy()
        .args(["merge", "/nonexistent/cov.out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// ---------------------------------------------------------------------------
// funcs
// ---------------------------------------------------------------------------

#[test]
fn test_funcs_text_output() {
    testredundancy()
        .args(["-p", &fixture("gomod"), "funcs", &fixture("profiles/abs.out")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Abs"))
        .stdout(predicate::str::contains("66.7%"))
        .stdout(predicate::str::contains("(*Acc).Inc"))
        .stdout(predicate::str::contains("total:"))
        .stdout(predicate::str::contains("40.0%"));
}

#[test]
fn test_funcs_json_output() {
    let output = testredundancy()
        .args(["-p", &fixture("gomod"), "-f", "json", "funcs", &fixture("profiles/add.out")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["functions"]["example.com/calc/calc.go:Add"], 100.0);
    assert_eq!(value["functions"]["example.com/calc/calc.go:Abs"], 0.0);
    assert_eq!(value["total"], 20.0);
}

#[test]
fn test_funcs_outside_module_fails() {
    let temp = TempDir::new().unwrap();
    testredundancy()
        .args([
            "-p",
            temp.path().to_str().unwrap(),
            "funcs",
            &fixture("profiles/add.out"),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("go.mod"));
}
