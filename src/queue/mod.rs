//! Per-directory work batches and the shared queue serving them.
//!
//! Tests are grouped by source directory so one worker runs a directory
//! end to end, which keeps per-directory timing meaningful and gives the
//! shared harness process locality. There is no work stealing: a popped
//! batch belongs to its worker until drained or abandoned on cancellation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::models::TestCase;

/// An ordered run of tests from one directory, owned by one worker.
#[derive(Debug)]
pub struct WorkBatch {
    pub directory: String,
    tests: VecDeque<TestCase>,
}

impl WorkBatch {
    fn new(directory: String, tests: Vec<TestCase>) -> Self {
        WorkBatch {
            directory,
            tests: tests.into(),
        }
    }

    pub fn next_test(&mut self) -> Option<TestCase> {
        self.tests.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Thread-safe batch queue with a non-blocking pop.
#[derive(Debug)]
pub struct WorkQueue {
    batches: Mutex<VecDeque<WorkBatch>>,
}

impl WorkQueue {
    /// Partition the test list into per-directory batches, queued in
    /// directory order.
    pub fn new(tests: Vec<TestCase>) -> Self {
        let mut by_directory: BTreeMap<String, Vec<TestCase>> = BTreeMap::new();
        for test in tests {
            let directory = test.directory().to_string();
            by_directory.entry(directory).or_default().push(test);
        }
        let batches = by_directory
            .into_iter()
            .map(|(directory, tests)| WorkBatch::new(directory, tests))
            .collect();
        WorkQueue {
            batches: Mutex::new(batches),
        }
    }

    /// Take the next batch, or None when the queue is exhausted. Never
    /// blocks beyond the empty-check itself.
    pub fn pop(&self) -> Option<WorkBatch> {
        self.batches.lock().ok()?.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or(0)
    }
}
