//! A single discovered layout test.

use serde::{Deserialize, Serialize};

/// One test from the layout tree.
///
/// Identity is the normalized relative path; everything else is fixed at
/// list-load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Path relative to the layout root, forward slashes only.
    pub path: String,
    /// file:// URI handed to the harness.
    pub uri: String,
    /// Per-test timeout in milliseconds.
    pub timeout_ms: u64,
    /// Expected image checksum, when the test has a `-expected.checksum`
    /// baseline. Empty field on the wire when absent.
    pub expected_hash: Option<String>,
}

impl TestCase {
    pub fn new(path: &str, uri: &str, timeout_ms: u64, expected_hash: Option<String>) -> Self {
        TestCase {
            path: normalize_path(path),
            uri: uri.to_string(),
            timeout_ms,
            expected_hash,
        }
    }

    /// Directory component of the test path ("" for top-level tests).
    pub fn directory(&self) -> &str {
        directory_of(&self.path)
    }
}

/// Directory component of a normalized test path.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Normalize a test path: forward slashes, no leading `./`, no trailing
/// slash. Expectation entries and discovered tests go through the same
/// normalization so lookups compare equal strings.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    while p.ends_with('/') && p.len() > 1 {
        p.pop();
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_backslashes() {
        assert_eq!(normalize_path("fast\\css\\a.html"), "fast/css/a.html");
    }

    #[test]
    fn test_normalize_path_leading_dot_slash() {
        assert_eq!(normalize_path("./fast/a.html"), "fast/a.html");
    }

    #[test]
    fn test_normalize_path_trailing_slash() {
        assert_eq!(normalize_path("fast/css/"), "fast/css");
    }

    #[test]
    fn test_directory_of_nested_test() {
        let t = TestCase::new("fast/css/a.html", "file:///tests/fast/css/a.html", 10_000, None);
        assert_eq!(t.directory(), "fast/css");
    }

    #[test]
    fn test_directory_of_top_level_test() {
        let t = TestCase::new("a.html", "file:///tests/a.html", 10_000, None);
        assert_eq!(t.directory(), "");
    }
}
