//! End-to-end tests driving a fake harness shell script through the real
//! discovery, worker, classification and reconciliation stack.

use std::path::{Path, PathBuf};

use plumb::cli::RunArgs;
use plumb::commands::{check, rebaseline, run};
use plumb::models::Platform;
use serde_json::Value;
use serial_test::serial;
use tempfile::TempDir;

/// A harness that echoes the submitted URL, renders fixed text, and fakes
/// crashes and timeouts for tests whose names ask for them.
const FAKE_HARNESS: &str = r##"#!/bin/sh
while read -r uri timeout hash; do
  case "$uri" in
    *crash*) exit 1 ;;
  esac
  echo "#URL:$uri"
  case "$uri" in
    *slow*) echo "#TEST_TIMED_OUT" ;;
    *) echo "rendered output" ;;
  esac
  if [ -n "$hash" ]; then echo "#MD5:$hash"; fi
  echo "#EOF"
done
"##;

fn touch(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_harness(root: &Path, content: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = root.join("plumb-e2e-harness");
    std::fs::write(&path, content).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn run_args(root: &Path, harness: &Path) -> RunArgs {
    RunArgs {
        layout_root: root.to_path_buf(),
        harness: Some(harness.display().to_string()),
        harness_args: Vec::new(),
        workers: Some(2),
        isolated: false,
        fixable: Vec::new(),
        ignored: Vec::new(),
        platform: Some(Platform::Linux),
        build_mode: None,
        new_baseline: false,
        filter: None,
        timeout_ms: Some(2_000),
        bounce_after: None,
        no_images: false,
        output_dir: root.join("out"),
        config: None,
        verbose: false,
    }
}

fn report_set(output_dir: &Path, key: &str) -> Vec<String> {
    let json = std::fs::read_to_string(output_dir.join("report.json")).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    value[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
#[serial]
fn test_run_reports_regressions_and_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/pass.html", "<html/>");
    touch(root, "fast/pass-expected.txt", "rendered output\n");
    touch(root, "fast/mismatch.html", "<html/>");
    touch(root, "fast/mismatch-expected.txt", "other text\n");
    touch(root, "editing/crash.html", "<html/>");
    touch(root, "editing/crash-expected.txt", "rendered output\n");
    touch(root, "fixable.txt", "editing/crash.html = CRASH\n");
    let harness = write_harness(root, FAKE_HARNESS);

    let mut args = run_args(root, &harness);
    args.fixable = vec![root.join("fixable.txt")];

    let code = run::execute(args).unwrap();
    // One regression: the mismatch. The crash was expected.
    assert_eq!(code, 1);

    assert_eq!(
        report_set(&root.join("out"), "regressed_failures"),
        vec!["fast/mismatch.html".to_string()]
    );
    assert!(report_set(&root.join("out"), "regressed_crashes").is_empty());

    let timings = std::fs::read_to_string(root.join("out/timings.json")).unwrap();
    assert!(timings.contains("fast/pass.html"));
    assert!(timings.contains("editing/crash.html"));
}

#[test]
#[serial]
fn test_harness_timeout_signal_becomes_regressed_timeout() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/slow.html", "<html/>");
    touch(root, "fast/slow-expected.txt", "rendered output\n");
    let harness = write_harness(root, FAKE_HARNESS);

    let code = run::execute(run_args(root, &harness)).unwrap();
    assert_eq!(code, 1);
    assert_eq!(
        report_set(&root.join("out"), "regressed_timeouts"),
        vec!["fast/slow.html".to_string()]
    );
}

#[test]
#[serial]
fn test_rebaseline_then_run_is_clean() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/drift.html", "<html/>");
    touch(root, "fast/drift-expected.txt", "stale baseline\n");
    let harness = write_harness(root, FAKE_HARNESS);

    let code = rebaseline::execute(run_args(root, &harness)).unwrap();
    assert_eq!(code, 0);
    let baseline = std::fs::read_to_string(root.join("fast/drift-expected.txt")).unwrap();
    assert_eq!(baseline, "rendered output\n");

    let code = run::execute(run_args(root, &harness)).unwrap();
    assert_eq!(code, 0);
}

#[test]
#[serial]
fn test_desync_aborts_run_with_no_report() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/a.html", "<html/>");
    let harness = write_harness(
        root,
        "#!/bin/sh\nread -r uri timeout hash\necho \"#URL:file:///elsewhere.html\"\necho \"#EOF\"\n",
    );

    let err = run::execute(run_args(root, &harness)).unwrap_err();
    assert!(err.to_string().contains("desynchronized"));
    assert!(!root.join("out/report.json").exists());
}

#[test]
#[serial]
fn test_skipped_tests_never_reach_the_harness() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/skipme.html", "<html/>");
    touch(root, "fast/run.html", "<html/>");
    touch(root, "fast/run-expected.txt", "rendered output\n");
    touch(root, "fixable.txt", "SKIP : fast/skipme.html = FAIL\n");

    // Log every submitted URL so the assertion can see what ran.
    let log = root.join("submissions.log");
    let harness = write_harness(
        root,
        &format!(
            r##"#!/bin/sh
while read -r uri timeout hash; do
  echo "$uri" >> "{}"
  echo "#URL:$uri"
  echo "rendered output"
  echo "#EOF"
done
"##,
            log.display()
        ),
    );

    let mut args = run_args(root, &harness);
    args.fixable = vec![root.join("fixable.txt")];
    let code = run::execute(args).unwrap();
    assert_eq!(code, 0);

    let submissions = std::fs::read_to_string(&log).unwrap();
    assert!(submissions.contains("run.html"));
    assert!(!submissions.contains("skipme.html"));
}

#[test]
#[serial]
fn test_isolated_mode_end_to_end() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/a.html", "<html/>");
    touch(root, "fast/a-expected.txt", "rendered output\n");
    touch(root, "fast/b.html", "<html/>");
    touch(root, "fast/b-expected.txt", "rendered output\n");
    let harness = write_harness(root, FAKE_HARNESS);

    let mut args = run_args(root, &harness);
    args.isolated = true;
    let code = run::execute(args).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn test_check_reports_expectation_errors() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "fast/a.html", "<html/>");
    touch(root, "fixable.txt", "fast/a.html = FAIL\nno-such.html = FAIL\n");

    let args = plumb::cli::CheckArgs {
        layout_root: root.to_path_buf(),
        fixable: vec![root.join("fixable.txt")],
        ignored: Vec::new(),
        platform: Some(Platform::Linux),
        build_mode: None,
    };
    assert_eq!(check::execute(args).unwrap(), 1);

    touch(root, "fixable.txt", "fast/a.html = FAIL\n");
    let args = plumb::cli::CheckArgs {
        layout_root: root.to_path_buf(),
        fixable: vec![root.join("fixable.txt")],
        ignored: Vec::new(),
        platform: Some(Platform::Linux),
        build_mode: None,
    };
    assert_eq!(check::execute(args).unwrap(), 0);
}
