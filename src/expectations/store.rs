//! Resolved expectations for a test universe.
//!
//! The store is built once, before any test executes, from the expectation
//! files and the discovered test list. Directory entries are expanded to
//! concrete tests at load time, conflicts are resolved by specificity, and
//! the load invariants are enforced here so a bad configuration aborts the
//! run up front.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::expectations::parse::{parse_file, Outcome, ParsedLine};
use crate::models::{BuildMode, Platform};

/// Which expectation file an entry came from.
///
/// Fixable entries are regressions somebody intends to fix; Ignored entries
/// are permanently accepted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Fixable,
    Ignored,
}

impl FileClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileClass::Fixable => "fixable",
            FileClass::Ignored => "ignored",
        }
    }
}

/// One problem found while loading expectation files.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadIssue {
    pub message: String,
    /// (file name, line number) when the issue points at a concrete line.
    pub location: Option<(String, usize)>,
}

impl std::fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some((file, line)) => write!(f, "{file}:{line}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for LoadIssue {}

/// Aggregate of every problem in the loaded files, raised as one error.
#[derive(Debug)]
pub struct LoadError {
    pub issues: Vec<LoadIssue>,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} expectation error(s):", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedEntry {
    outcomes: BTreeSet<Outcome>,
    deferred: bool,
    class: FileClass,
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    file: &'a str,
    class: FileClass,
    line: &'a ParsedLine,
    exact: bool,
}

/// Per-test expectations plus the derived views.
#[derive(Debug, Default)]
pub struct ExpectationStore {
    entries: BTreeMap<String, ResolvedEntry>,
    skipped: BTreeSet<String>,
    deferred: BTreeSet<String>,
    fixable: BTreeSet<String>,
    ignored: BTreeSet<String>,
}

impl ExpectationStore {
    /// Load expectation files from disk against the discovered universe.
    pub fn from_files(
        files: &[(FileClass, PathBuf)],
        universe: &BTreeSet<String>,
        platform: Platform,
        build_mode: BuildMode,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        for (class, path) in files {
            let content = std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read expectation file: {}", path.display())
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            sources.push((*class, name, content));
        }
        let borrowed: Vec<(FileClass, &str, &str)> = sources
            .iter()
            .map(|(class, name, content)| (*class, name.as_str(), content.as_str()))
            .collect();
        Self::from_contents(&borrowed, universe, platform, build_mode).map_err(anyhow::Error::new)
    }

    /// Build the store from in-memory file contents.
    ///
    /// Errors are collected across every file and returned together; a
    /// non-empty issue list means no store is produced at all.
    pub fn from_contents(
        sources: &[(FileClass, &str, &str)],
        universe: &BTreeSet<String>,
        platform: Platform,
        build_mode: BuildMode,
    ) -> std::result::Result<Self, LoadError> {
        let mut issues: Vec<LoadIssue> = Vec::new();
        let mut parsed: Vec<(FileClass, &str, Vec<ParsedLine>)> = Vec::new();

        for (class, name, content) in sources {
            let (lines, errors) = parse_file(content);
            for err in errors {
                issues.push(LoadIssue {
                    message: err.message,
                    location: Some((name.to_string(), err.line_number)),
                });
            }
            let applicable: Vec<ParsedLine> = lines
                .into_iter()
                .filter(|l| l.applies_to(platform, build_mode))
                .collect();
            parsed.push((*class, name, applicable));
        }

        let mut skipped: BTreeSet<String> = BTreeSet::new();
        let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        // Matched tests per file class, kept before specificity
        // resolution: the fixable/ignored overlap invariant is about what
        // each class of file lists, not about which entry wins a conflict.
        let mut fixable_listed: BTreeSet<String> = BTreeSet::new();
        let mut ignored_listed: BTreeSet<String> = BTreeSet::new();

        for (class, name, lines) in &parsed {
            // The identical path twice in one file is always a
            // configuration mistake, even when one of them is a skip.
            let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
            for line in lines {
                if let Some(first) = seen.get(line.path.as_str()) {
                    issues.push(LoadIssue {
                        message: format!(
                            "duplicated path '{}' (first declared on line {first})",
                            line.path
                        ),
                        location: Some((name.to_string(), line.line_number)),
                    });
                    continue;
                }
                seen.insert(&line.path, line.line_number);

                if line.is_defer() && line.outcomes.contains(&Outcome::Crash) {
                    issues.push(LoadIssue {
                        message: format!(
                            "'{}' expects a crash and is deferred; crashes may not be deferred",
                            line.path
                        ),
                        location: Some((name.to_string(), line.line_number)),
                    });
                }

                let matched = match_tests(&line.path, universe);
                if matched.is_empty() {
                    issues.push(LoadIssue {
                        message: format!("path matches no known test: {}", line.path),
                        location: Some((name.to_string(), line.line_number)),
                    });
                    continue;
                }
                let exact = matched.len() == 1 && matched[0] == line.path;

                for test in matched {
                    if line.is_skip() {
                        skipped.insert(test.clone());
                    } else {
                        match class {
                            FileClass::Fixable => {
                                if !line.is_defer() && line_expects_failure(line) {
                                    fixable_listed.insert(test.clone());
                                }
                            }
                            FileClass::Ignored => {
                                ignored_listed.insert(test.clone());
                            }
                        }
                        candidates.entry(test).or_default().push(Candidate {
                            file: name,
                            class: *class,
                            line,
                            exact,
                        });
                    }
                }
            }
        }

        for test in fixable_listed.intersection(&ignored_listed) {
            if !skipped.contains(test) {
                issues.push(LoadIssue {
                    message: format!("'{test}' is listed as both fixable and ignored"),
                    location: None,
                });
            }
        }

        let mut entries: BTreeMap<String, ResolvedEntry> = BTreeMap::new();
        for (test, mut cands) in candidates {
            cands.sort_by_key(|c| std::cmp::Reverse((c.exact, c.line.path.len())));
            if cands.len() > 1 {
                let (a, b) = (&cands[0], &cands[1]);
                if a.exact == b.exact && a.line.path.len() == b.line.path.len() {
                    issues.push(LoadIssue {
                        message: format!(
                            "ambiguous entries for '{test}': {}:{} and {}:{}",
                            a.file, a.line.line_number, b.file, b.line.line_number
                        ),
                        location: None,
                    });
                }
            }
            let winner = &cands[0];
            entries.insert(
                test,
                ResolvedEntry {
                    outcomes: winner.line.outcomes.iter().copied().collect(),
                    deferred: winner.line.is_defer(),
                    class: winner.class,
                },
            );
        }

        let deferred: BTreeSet<String> = entries
            .iter()
            .filter(|(_, e)| e.deferred)
            .map(|(t, _)| t.clone())
            .collect();

        let expects_failure = |e: &ResolvedEntry| {
            e.outcomes.contains(&Outcome::Fail)
                || e.outcomes.contains(&Outcome::Timeout)
                || e.outcomes.contains(&Outcome::Crash)
        };
        let fixable: BTreeSet<String> = entries
            .iter()
            .filter(|(t, e)| {
                e.class == FileClass::Fixable
                    && !e.deferred
                    && expects_failure(e)
                    && !skipped.contains(*t)
            })
            .map(|(t, _)| t.clone())
            .collect();
        let ignored: BTreeSet<String> = entries
            .iter()
            .filter(|(t, e)| e.class == FileClass::Ignored && !skipped.contains(*t))
            .map(|(t, _)| t.clone())
            .collect();

        if !issues.is_empty() {
            return Err(LoadError { issues });
        }

        Ok(ExpectationStore {
            entries,
            skipped,
            deferred,
            fixable,
            ignored,
        })
    }

    /// Allowed outcomes for a test. Tests with no matching entry are
    /// expected to pass.
    pub fn expectations(&self, path: &str) -> BTreeSet<Outcome> {
        match self.entries.get(path) {
            Some(entry) => entry.outcomes.clone(),
            None => BTreeSet::from([Outcome::Pass]),
        }
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skipped.contains(path)
    }

    pub fn is_deferred(&self, path: &str) -> bool {
        self.deferred.contains(path)
    }

    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    pub fn deferred(&self) -> &BTreeSet<String> {
        &self.deferred
    }

    pub fn fixable(&self) -> &BTreeSet<String> {
        &self.fixable
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    /// Fixable tests expected to crash.
    pub fn fixable_crashes(&self) -> BTreeSet<String> {
        self.fixable_with(|o| o.contains(&Outcome::Crash))
    }

    /// Fixable tests expected to time out, crashes excluded.
    pub fn fixable_timeouts(&self) -> BTreeSet<String> {
        self.fixable_with(|o| o.contains(&Outcome::Timeout) && !o.contains(&Outcome::Crash))
    }

    /// Fixable tests expected to fail, timeouts and crashes excluded.
    pub fn fixable_failures(&self) -> BTreeSet<String> {
        self.fixable_with(|o| {
            o.contains(&Outcome::Fail)
                && !o.contains(&Outcome::Timeout)
                && !o.contains(&Outcome::Crash)
        })
    }

    fn fixable_with(&self, pred: impl Fn(&BTreeSet<Outcome>) -> bool) -> BTreeSet<String> {
        self.fixable
            .iter()
            .filter(|t| {
                self.entries
                    .get(*t)
                    .map(|e| pred(&e.outcomes))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

/// Whether a line expects some kind of failure, as opposed to pass-only.
fn line_expects_failure(line: &ParsedLine) -> bool {
    line.outcomes
        .iter()
        .any(|o| matches!(o, Outcome::Fail | Outcome::Timeout | Outcome::Crash))
}

/// Tests matched by an entry path: the test itself for an exact match,
/// otherwise every test under the path taken as a directory prefix.
fn match_tests(path: &str, universe: &BTreeSet<String>) -> Vec<String> {
    if universe.contains(path) {
        return vec![path.to_string()];
    }
    let prefix = format!("{path}/");
    universe
        .iter()
        .filter(|t| t.starts_with(&prefix))
        .cloned()
        .collect()
}
