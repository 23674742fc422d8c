//! Reconciling observed results against the expectation store.
//!
//! A pure read over the results map: each non-skipped, non-deferred test
//! lands in at most one of five disjoint sets, chosen by the dominant
//! failure kind and the test's allowed outcomes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::expectations::{ExpectationStore, Outcome};
use crate::models::{FailureKind, TestResult};

/// The categorized diff between a run and its expectations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RegressionReport {
    /// Passed, but a failure was expected. Needs an expectations edit.
    pub unexpected_pass: BTreeSet<String>,
    /// Content mismatch where none was allowed.
    pub regressed_failures: BTreeSet<String>,
    /// Timed out without a timeout expectation.
    pub regressed_timeouts: BTreeSet<String>,
    /// Crashed without a crash expectation.
    pub regressed_crashes: BTreeSet<String>,
    /// No baseline to compare against. Empty in baseline-generation mode.
    pub missing_results: BTreeSet<String>,
}

impl RegressionReport {
    /// Tests that got worse than their expectations allow. This is the
    /// process exit count; unexpected passes and missing baselines are
    /// reported but not counted.
    pub fn regressed_count(&self) -> usize {
        self.regressed_failures.len() + self.regressed_timeouts.len() + self.regressed_crashes.len()
    }

    pub fn is_clean(&self) -> bool {
        self.regressed_count() == 0
            && self.unexpected_pass.is_empty()
            && self.missing_results.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let mut add = |count: usize, what: &str| {
            if count > 0 {
                parts.push(format!("{count} {what}"));
            }
        };
        add(self.regressed_crashes.len(), "regressed crashes");
        add(self.regressed_timeouts.len(), "regressed timeouts");
        add(self.regressed_failures.len(), "regressed failures");
        add(self.missing_results.len(), "missing results");
        add(self.unexpected_pass.len(), "unexpected passes");
        if parts.is_empty() {
            "no regressions".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Partition the universe by observed outcome versus allowed outcomes.
///
/// Absence from the results map means the test passed. Skipped and
/// deferred tests never appear in any set.
pub fn reconcile(
    universe: &BTreeSet<String>,
    results: &BTreeMap<String, TestResult>,
    store: &ExpectationStore,
    new_baseline: bool,
) -> RegressionReport {
    let mut report = RegressionReport::default();

    for test in universe {
        if store.is_skipped(test) || store.is_deferred(test) {
            continue;
        }
        let allowed = store.expectations(test);
        let dominant = results.get(test).and_then(|r| r.dominant());

        match dominant {
            None => {
                if !allowed.contains(&Outcome::Pass) {
                    report.unexpected_pass.insert(test.clone());
                }
            }
            Some(FailureKind::Crash) => {
                if !allowed.contains(&Outcome::Crash) {
                    report.regressed_crashes.insert(test.clone());
                }
            }
            Some(FailureKind::Timeout) => {
                if !allowed.contains(&Outcome::Timeout) {
                    report.regressed_timeouts.insert(test.clone());
                }
            }
            Some(FailureKind::MissingResult) => {
                if !new_baseline {
                    report.missing_results.insert(test.clone());
                }
            }
            Some(
                FailureKind::TextMismatch
                | FailureKind::ImageMismatch
                | FailureKind::MissingImageHash,
            ) => {
                if !allowed.contains(&Outcome::Fail) {
                    report.regressed_failures.insert(test.clone());
                }
            }
        }
    }

    report
}
