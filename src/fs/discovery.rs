//! Test discovery over the layout tree.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use crate::fs::baseline;
use crate::models::{normalize_path, Platform, TestCase};

/// File extensions that count as tests.
const TEST_EXTENSIONS: &[&str] = &["html", "htm", "shtml", "xml", "xhtml", "svg"];

/// Directory names that never contain tests.
const SKIPPED_DIRS: &[&str] = &["platform", "resources", "script-tests"];

/// Walk the layout root and build the immutable test list.
///
/// Baseline siblings (`*-expected.*`), helper directories and hidden
/// directories are not tests. The expected image hash is resolved here so
/// the list is fixed before any worker starts.
pub fn discover_tests(
    root: &Path,
    platform: Platform,
    default_timeout_ms: u64,
    filter: Option<&Regex>,
) -> Result<Vec<TestCase>> {
    let mut tests = Vec::new();

    for ext in TEST_EXTENSIONS {
        let pattern = format!("{}/**/*.{ext}", root.display());
        let entries = glob::glob(&pattern)
            .with_context(|| format!("Bad discovery pattern: {pattern}"))?;
        for entry in entries {
            let path = entry.context("Failed to read a discovery entry")?;
            let relative = match path.strip_prefix(root) {
                Ok(rel) => normalize_path(&rel.to_string_lossy()),
                Err(_) => continue,
            };

            if !is_test_path(&relative) {
                continue;
            }
            if let Some(filter) = filter {
                if !filter.is_match(&relative) {
                    continue;
                }
            }

            let absolute = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve test path: {}", path.display()))?;
            let uri = format!("file://{}", absolute.display());
            let expected_hash = baseline::expected_image_hash(root, &relative, platform)?;
            tests.push(TestCase::new(&relative, &uri, default_timeout_ms, expected_hash));
        }
    }

    tests.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tests)
}

fn is_test_path(relative: &str) -> bool {
    let mut components = relative.split('/').peekable();
    while let Some(component) = components.next() {
        let is_file = components.peek().is_none();
        if is_file {
            if component.contains("-expected.") {
                return false;
            }
        } else if SKIPPED_DIRS.contains(&component) || component.starts_with('.') {
            return false;
        }
    }
    true
}

/// The set of test identities, for expectation loading.
pub fn universe(tests: &[TestCase]) -> BTreeSet<String> {
    tests.iter().map(|t| t.path.clone()).collect()
}
