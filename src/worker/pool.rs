//! Fixed-size pool of worker threads.
//!
//! The pool spawns one OS thread per worker, lets them drain the shared
//! queue, then joins them all and folds their reports into one outcome.
//! Workers never talk to each other; the queue pop and the results map are
//! the only shared state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::RunConfig;
use crate::harness::ProcessRegistry;
use crate::models::{TestCase, TestResult};
use crate::queue::WorkQueue;
use crate::stats::TestTimings;
use crate::worker::{Worker, WorkerExit};

/// How the run as a whole ended, the worst worker exit winning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The cancellation flag was set between tests.
    Cancelled,
    /// A worker could not keep running (spawn or disk failure).
    Failed { detail: String },
    /// A shared stream lost test-to-output attribution.
    Desynchronized { detail: String },
    /// A harness died from the user's interrupt; the caller re-raises it.
    Interrupted,
}

impl RunStatus {
    fn severity(&self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Cancelled => 1,
            RunStatus::Failed { .. } => 2,
            RunStatus::Desynchronized { .. } => 3,
            RunStatus::Interrupted => 4,
        }
    }

    fn worse(self, other: RunStatus) -> RunStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl From<WorkerExit> for RunStatus {
    fn from(exit: WorkerExit) -> Self {
        match exit {
            WorkerExit::Completed => RunStatus::Completed,
            WorkerExit::Cancelled => RunStatus::Cancelled,
            WorkerExit::Interrupted => RunStatus::Interrupted,
            WorkerExit::Desynchronized { detail } => RunStatus::Desynchronized { detail },
            WorkerExit::Failed { detail } => RunStatus::Failed { detail },
        }
    }
}

/// Everything the pool hands back after the threads join.
#[derive(Debug)]
pub struct PoolOutcome {
    pub status: RunStatus,
    pub results: BTreeMap<String, TestResult>,
    pub timings: TestTimings,
    pub tests_run: usize,
}

/// Run the tests across a fixed number of worker threads and wait for all
/// of them. Always joins every thread before returning, even when a worker
/// fails, so no harness subprocess outlives the call.
pub fn run_pool(
    config: Arc<RunConfig>,
    tests: Vec<TestCase>,
    cancel: Arc<AtomicBool>,
    registry: Arc<dyn ProcessRegistry>,
) -> PoolOutcome {
    let queue = Arc::new(WorkQueue::new(tests));
    let results: Arc<Mutex<BTreeMap<String, TestResult>>> = Arc::new(Mutex::new(BTreeMap::new()));

    let mut handles = Vec::new();
    for id in 0..config.workers.max(1) {
        let worker = Worker::new(
            id,
            config.clone(),
            queue.clone(),
            results.clone(),
            cancel.clone(),
            registry.clone(),
        );
        handles.push(std::thread::spawn(move || worker.run()));
    }

    let mut status = RunStatus::Completed;
    let mut timings = TestTimings::new();
    let mut tests_run = 0;
    for handle in handles {
        match handle.join() {
            Ok(report) => {
                tests_run += report.tests_run;
                timings.merge(report.timings);
                status = status.worse(report.exit.into());
            }
            Err(_) => {
                cancel.store(true, Ordering::SeqCst);
                status = status.worse(RunStatus::Failed {
                    detail: "worker thread panicked".to_string(),
                });
            }
        }
    }

    let results = match Arc::try_unwrap(results) {
        Ok(mutex) => mutex.into_inner().unwrap_or_default(),
        Err(shared) => shared.lock().map(|m| m.clone()).unwrap_or_default(),
    };

    PoolOutcome {
        status,
        results,
        timings,
        tests_run,
    }
}
