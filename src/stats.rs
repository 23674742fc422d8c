//! Per-test and per-directory timing statistics.
//!
//! Each worker records into its own `TestTimings` and the pool merges them
//! after the threads join, so recording is contention-free.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::directory_of;

#[derive(Debug, Default, Clone, Serialize)]
pub struct TestTimings {
    tests: BTreeMap<String, u64>,
}

/// Aggregate for one source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryTiming {
    pub directory: String,
    pub tests: usize,
    pub total_ms: u64,
    pub mean_ms: u64,
    pub slowest_test: String,
    pub slowest_ms: u64,
}

impl TestTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str, duration_ms: u64) {
        self.tests.insert(path.to_string(), duration_ms);
    }

    pub fn merge(&mut self, other: TestTimings) {
        self.tests.extend(other.tests);
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn total_ms(&self) -> u64 {
        self.tests.values().sum()
    }

    /// Directory aggregates, slowest total first.
    pub fn by_directory(&self) -> Vec<DirectoryTiming> {
        let mut grouped: BTreeMap<&str, Vec<(&str, u64)>> = BTreeMap::new();
        for (path, ms) in &self.tests {
            grouped
                .entry(directory_of(path))
                .or_default()
                .push((path, *ms));
        }

        let mut timings: Vec<DirectoryTiming> = grouped
            .into_iter()
            .map(|(directory, tests)| {
                let total_ms: u64 = tests.iter().map(|(_, ms)| ms).sum();
                let (slowest_test, slowest_ms) = tests
                    .iter()
                    .max_by_key(|(_, ms)| *ms)
                    .map(|(path, ms)| (path.to_string(), *ms))
                    .unwrap_or_default();
                DirectoryTiming {
                    directory: directory.to_string(),
                    tests: tests.len(),
                    mean_ms: total_ms / tests.len() as u64,
                    total_ms,
                    slowest_test,
                    slowest_ms,
                }
            })
            .collect();
        timings.sort_by(|a, b| b.total_ms.cmp(&a.total_ms).then(a.directory.cmp(&b.directory)));
        timings
    }

    pub fn slowest_directories(&self, n: usize) -> Vec<DirectoryTiming> {
        let mut timings = self.by_directory();
        timings.truncate(n);
        timings
    }

    /// Dump the full table as a JSON artifact.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct TimingsArtifact<'a> {
            generated_at: DateTime<Utc>,
            total_ms: u64,
            tests: &'a BTreeMap<String, u64>,
            directories: Vec<DirectoryTiming>,
        }

        let artifact = TimingsArtifact {
            generated_at: Utc::now(),
            total_ms: self.total_ms(),
            tests: &self.tests,
            directories: self.by_directory(),
        };
        let json = serde_json::to_string_pretty(&artifact).context("Failed to encode timings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write timings: {}", path.display()))?;
        Ok(())
    }
}
