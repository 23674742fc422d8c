//! Observed failure kinds and per-test results.

use serde::{Deserialize, Serialize};

/// One observed failure of a test run.
///
/// A passing test has an empty failure set; `Pass` is never a member here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TextMismatch,
    ImageMismatch,
    Crash,
    Timeout,
    MissingResult,
    MissingImageHash,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TextMismatch => "text mismatch",
            FailureKind::ImageMismatch => "image mismatch",
            FailureKind::Crash => "crash",
            FailureKind::Timeout => "timeout",
            FailureKind::MissingResult => "missing result",
            FailureKind::MissingImageHash => "missing image hash",
        }
    }

    /// Rank used when one test exhibits several kinds at once:
    /// crash > timeout > missing result > content mismatch.
    pub fn rank(&self) -> u8 {
        match self {
            FailureKind::Crash => 3,
            FailureKind::Timeout => 2,
            FailureKind::MissingResult => 1,
            FailureKind::TextMismatch
            | FailureKind::ImageMismatch
            | FailureKind::MissingImageHash => 0,
        }
    }

    /// True for the kinds that mean the harness produced no trustworthy
    /// output for the test.
    pub fn invalidates_output(&self) -> bool {
        matches!(self, FailureKind::Crash | FailureKind::Timeout)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completed run of one test: its failure set plus timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub failures: Vec<FailureKind>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn new(failures: Vec<FailureKind>, duration_ms: u64) -> Self {
        TestResult {
            failures,
            duration_ms,
        }
    }

    pub fn pass(duration_ms: u64) -> Self {
        TestResult {
            failures: Vec::new(),
            duration_ms,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.failures.is_empty()
    }

    /// Highest-ranked failure present, or None for a pass.
    pub fn dominant(&self) -> Option<FailureKind> {
        self.failures.iter().copied().max_by_key(|k| k.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_has_no_dominant_kind() {
        assert_eq!(TestResult::pass(12).dominant(), None);
    }

    #[test]
    fn test_crash_dominates_text_mismatch() {
        let r = TestResult::new(vec![FailureKind::TextMismatch, FailureKind::Crash], 5);
        assert_eq!(r.dominant(), Some(FailureKind::Crash));
    }

    #[test]
    fn test_timeout_dominates_missing_result() {
        let r = TestResult::new(vec![FailureKind::MissingResult, FailureKind::Timeout], 5);
        assert_eq!(r.dominant(), Some(FailureKind::Timeout));
    }

    #[test]
    fn test_content_kinds_share_lowest_rank() {
        assert_eq!(FailureKind::TextMismatch.rank(), 0);
        assert_eq!(FailureKind::ImageMismatch.rank(), 0);
        assert_eq!(FailureKind::MissingImageHash.rank(), 0);
    }

    #[test]
    fn test_invalidates_output() {
        assert!(FailureKind::Crash.invalidates_output());
        assert!(FailureKind::Timeout.invalidates_output());
        assert!(!FailureKind::MissingResult.invalidates_output());
        assert!(!FailureKind::TextMismatch.invalidates_output());
    }
}
