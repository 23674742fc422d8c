//! Integration tests for the load-and-reconcile half of the pipeline.
//!
//! Expectation files live on disk and are loaded through the public API
//! against a discovered test universe; no harness process is involved.

use std::collections::BTreeMap;
use std::path::Path;

use plumb::expectations::{ExpectationStore, FileClass, LoadError, Outcome};
use plumb::fs::discovery;
use plumb::models::{BuildMode, FailureKind, Platform, TestResult};
use plumb::reconcile::reconcile;
use tempfile::TempDir;

fn touch(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A small layout tree with a few directories of tests.
fn layout_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for rel in [
        "fast/foo.html",
        "fast/bar.html",
        "svg/shapes.svg",
        "editing/delete.html",
    ] {
        touch(root, rel, "<html/>");
    }
    dir
}

#[test]
fn test_expectation_files_loaded_from_disk() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(
        root,
        "expectations/fixable.txt",
        "// current regressions\nfast/foo.html = FAIL\nDEFER : svg/ = TIMEOUT\n",
    );
    touch(root, "expectations/ignored.txt", "editing/ = FAIL\n");

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);

    let store = ExpectationStore::from_files(
        &[
            (FileClass::Fixable, root.join("expectations/fixable.txt")),
            (FileClass::Ignored, root.join("expectations/ignored.txt")),
        ],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap();

    assert!(store.fixable().contains("fast/foo.html"));
    assert!(store.ignored().contains("editing/delete.html"));
    assert!(store.is_deferred("svg/shapes.svg"));
    assert_eq!(
        store.expectations("fast/bar.html"),
        [Outcome::Pass].into_iter().collect()
    );
}

#[test]
fn test_load_errors_collected_with_file_and_line() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(
        root,
        "fixable.txt",
        "fast/foo.html = FAIL\nfast/foo.html = CRASH\nWONTFIX : fast/bar.html = FAIL\n",
    );

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);

    let err = ExpectationStore::from_files(
        &[(FileClass::Fixable, root.join("fixable.txt"))],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap_err();

    let load = err.downcast::<LoadError>().unwrap();
    assert_eq!(load.issues.len(), 2);
    let rendered = load.to_string();
    assert!(rendered.contains("fixable.txt:2"));
    assert!(rendered.contains("fixable.txt:3"));
    assert!(rendered.contains("duplicated path"));
    assert!(rendered.contains("unknown modifier"));
}

#[test]
fn test_platform_skip_excluded_from_everything() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(root, "fixable.txt", "LINUX SKIP : fast/foo.html = FAIL\n");

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);
    let store = ExpectationStore::from_files(
        &[(FileClass::Fixable, root.join("fixable.txt"))],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap();

    assert!(store.is_skipped("fast/foo.html"));
    assert!(store.fixable().is_empty());
    assert!(store.ignored().is_empty());

    // A crash on the skipped test never reaches the report.
    let mut results = BTreeMap::new();
    results.insert(
        "fast/foo.html".to_string(),
        TestResult::new(vec![FailureKind::Crash], 5),
    );
    let report = reconcile(&universe, &results, &store, false);
    assert!(report.is_clean());
}

#[test]
fn test_specificity_resolution_through_files() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(root, "fixable.txt", "fast/ = FAIL\nfast/foo.html = CRASH\n");

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);
    let store = ExpectationStore::from_files(
        &[(FileClass::Fixable, root.join("fixable.txt"))],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap();

    assert_eq!(
        store.expectations("fast/foo.html"),
        [Outcome::Crash].into_iter().collect()
    );
    assert_eq!(
        store.expectations("fast/bar.html"),
        [Outcome::Fail].into_iter().collect()
    );
}

#[test]
fn test_reconcile_partitions_are_disjoint() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(root, "fixable.txt", "fast/foo.html = FAIL\n");

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);
    let store = ExpectationStore::from_files(
        &[(FileClass::Fixable, root.join("fixable.txt"))],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap();

    let mut results = BTreeMap::new();
    // foo passed although a failure was expected.
    // bar crashed and also mismatched; crash wins.
    results.insert(
        "fast/bar.html".to_string(),
        TestResult::new(vec![FailureKind::TextMismatch, FailureKind::Crash], 5),
    );
    // shapes timed out.
    results.insert(
        "svg/shapes.svg".to_string(),
        TestResult::new(vec![FailureKind::Timeout], 5),
    );
    // delete has no baseline.
    results.insert(
        "editing/delete.html".to_string(),
        TestResult::new(vec![FailureKind::MissingResult], 5),
    );

    let report = reconcile(&universe, &results, &store, false);
    assert!(report.unexpected_pass.contains("fast/foo.html"));
    assert!(report.regressed_crashes.contains("fast/bar.html"));
    assert!(report.regressed_failures.is_empty());
    assert!(report.regressed_timeouts.contains("svg/shapes.svg"));
    assert!(report.missing_results.contains("editing/delete.html"));
    assert_eq!(report.regressed_count(), 2);

    // Every test lands in at most one set.
    let all = [
        &report.unexpected_pass,
        &report.regressed_failures,
        &report.regressed_timeouts,
        &report.regressed_crashes,
        &report.missing_results,
    ];
    let total: usize = all.iter().map(|s| s.len()).sum();
    let distinct: std::collections::BTreeSet<&String> =
        all.iter().flat_map(|s| s.iter()).collect();
    assert_eq!(total, distinct.len());
}

#[test]
fn test_allowed_fail_produces_no_regression() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(root, "fixable.txt", "fast/foo.html = FAIL PASS\n");

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);
    let store = ExpectationStore::from_files(
        &[(FileClass::Fixable, root.join("fixable.txt"))],
        &universe,
        Platform::Linux,
        BuildMode::Release,
    )
    .unwrap();

    let mut results = BTreeMap::new();
    results.insert(
        "fast/foo.html".to_string(),
        TestResult::new(vec![FailureKind::TextMismatch], 5),
    );
    let report = reconcile(&universe, &results, &store, false);
    assert!(report.is_clean());

    // Passing is also fine under FAIL PASS.
    let report = reconcile(&universe, &BTreeMap::new(), &store, false);
    assert!(report.is_clean());
}

#[test]
fn test_reload_from_disk_is_idempotent() {
    let dir = layout_fixture();
    let root = dir.path();
    touch(
        root,
        "fixable.txt",
        "fast/ = FAIL\nSKIP : svg/shapes.svg = TIMEOUT\nDEFER : editing/ = FAIL\n",
    );

    let tests = discovery::discover_tests(root, Platform::Linux, 10_000, None).unwrap();
    let universe = discovery::universe(&tests);
    let files = [(FileClass::Fixable, root.join("fixable.txt"))];

    let first =
        ExpectationStore::from_files(&files, &universe, Platform::Linux, BuildMode::Release)
            .unwrap();
    let second =
        ExpectationStore::from_files(&files, &universe, Platform::Linux, BuildMode::Release)
            .unwrap();

    assert_eq!(first.fixable(), second.fixable());
    assert_eq!(first.ignored(), second.ignored());
    assert_eq!(first.skipped(), second.skipped());
    assert_eq!(first.deferred(), second.deferred());
}
