//! A worker thread: drains batches, drives the harness, records results.

pub mod pool;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::classify::{classify, CapturedOutput};
use crate::config::{ExecutionMode, RunConfig};
use crate::fs::baseline;
use crate::harness::{HarnessProcess, ProcessRegistry, ProtocolError};
use crate::models::{TestCase, TestResult};
use crate::queue::WorkQueue;
use crate::stats::TestTimings;

/// Wall-clock join deadline for an isolated harness, as a multiple of the
/// test's own timeout.
pub const JOIN_DEADLINE_MULTIPLIER: u64 = 3;

/// Why a worker stopped.
#[derive(Debug)]
pub enum WorkerExit {
    /// Queue exhausted.
    Completed,
    /// Cancellation flag observed between tests.
    Cancelled,
    /// The harness died from the user's interrupt.
    Interrupted,
    /// URL echo mismatch; attribution on the shared stream is gone.
    Desynchronized { detail: String },
    /// The worker could not keep running at all (spawn or disk failure).
    Failed { detail: String },
}

/// What a worker hands back to the pool.
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    pub tests_run: usize,
    pub timings: TestTimings,
    pub exit: WorkerExit,
}

enum WorkerError {
    Interrupted,
    Desynchronized(String),
    Fatal(anyhow::Error),
}

pub struct Worker {
    id: usize,
    config: Arc<RunConfig>,
    queue: Arc<WorkQueue>,
    results: Arc<Mutex<BTreeMap<String, TestResult>>>,
    cancel: Arc<AtomicBool>,
    registry: Arc<dyn ProcessRegistry>,
    harness: Option<HarnessProcess>,
    last_test_timed_out: bool,
    timings: TestTimings,
    tests_run: usize,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<RunConfig>,
        queue: Arc<WorkQueue>,
        results: Arc<Mutex<BTreeMap<String, TestResult>>>,
        cancel: Arc<AtomicBool>,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Self {
        Worker {
            id,
            config,
            queue,
            results,
            cancel,
            registry,
            harness: None,
            last_test_timed_out: false,
            timings: TestTimings::new(),
            tests_run: 0,
        }
    }

    /// Drain batches until the queue is empty or the run stops. Always
    /// terminates an owned subprocess before returning.
    pub fn run(mut self) -> WorkerReport {
        let exit = self.drain();
        if let Some(harness) = self.harness.take() {
            harness.stop();
        }
        // Fatal exits stop the whole run; siblings poll the flag.
        if matches!(
            exit,
            WorkerExit::Interrupted | WorkerExit::Desynchronized { .. } | WorkerExit::Failed { .. }
        ) {
            self.cancel.store(true, Ordering::SeqCst);
        }
        WorkerReport {
            id: self.id,
            tests_run: self.tests_run,
            timings: self.timings,
            exit,
        }
    }

    fn drain(&mut self) -> WorkerExit {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return WorkerExit::Cancelled;
            }
            let Some(mut batch) = self.queue.pop() else {
                return WorkerExit::Completed;
            };
            while let Some(test) = batch.next_test() {
                if self.cancel.load(Ordering::SeqCst) {
                    return WorkerExit::Cancelled;
                }
                match self.run_one(&test) {
                    Ok(()) => self.tests_run += 1,
                    Err(WorkerError::Interrupted) => return WorkerExit::Interrupted,
                    Err(WorkerError::Desynchronized(detail)) => {
                        return WorkerExit::Desynchronized { detail }
                    }
                    Err(WorkerError::Fatal(err)) => {
                        return WorkerExit::Failed {
                            detail: format!("{err:#}"),
                        }
                    }
                }
            }
        }
    }

    fn run_one(&mut self, test: &TestCase) -> Result<(), WorkerError> {
        let started = Instant::now();
        let captured = match self.config.mode {
            ExecutionMode::Shared => self.capture_shared(test)?,
            ExecutionMode::Isolated => self.capture_isolated(test)?,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let failures = if self.config.new_baseline && !captured.crashed && !captured.timed_out {
            self.write_baselines(test, &captured)
                .map_err(WorkerError::Fatal)?;
            Vec::new()
        } else {
            let baselines = baseline::read_baselines(
                &self.config.layout_root,
                &test.path,
                self.config.platform,
            )
            .map_err(WorkerError::Fatal)?;
            classify(&captured, &baselines, &self.config.classify)
        };

        self.timings.record(&test.path, duration_ms);
        if let Ok(mut map) = self.results.lock() {
            map.insert(test.path.clone(), TestResult::new(failures, duration_ms));
        }
        Ok(())
    }

    /// One test over the long-lived harness, respawning or bouncing it
    /// first when the policy says so.
    fn capture_shared(&mut self, test: &TestCase) -> Result<CapturedOutput, WorkerError> {
        let needs_bounce = match self.harness.as_mut() {
            Some(harness) => {
                !harness.is_alive()
                    || self
                        .config
                        .bounce
                        .should_bounce(harness.tests_served(), self.last_test_timed_out)
            }
            None => false,
        };
        if needs_bounce {
            if let Some(harness) = self.harness.take() {
                harness.stop();
            }
        }
        if self.harness.is_none() {
            self.harness = Some(
                HarnessProcess::spawn(&self.config.harness).map_err(WorkerError::Fatal)?,
            );
            self.last_test_timed_out = false;
        }

        let harness = self
            .harness
            .as_mut()
            .ok_or_else(|| WorkerError::Fatal(anyhow::anyhow!("harness missing after spawn")))?;
        match harness.run_test(test) {
            Ok(captured) => {
                self.last_test_timed_out = captured.timed_out;
                if captured.crashed {
                    // Continue with a fresh process on the next test.
                    if let Some(dead) = self.harness.take() {
                        dead.stop();
                    }
                }
                Ok(captured)
            }
            Err(err) => self.map_protocol_error(err),
        }
    }

    /// One test on a fresh harness, supervised by a hard join deadline.
    /// On expiry every instance of the harness executable is killed so the
    /// run keeps moving, and the test is recorded as a hang-induced crash.
    fn capture_isolated(&mut self, test: &TestCase) -> Result<CapturedOutput, WorkerError> {
        let mut harness =
            HarnessProcess::spawn(&self.config.harness).map_err(WorkerError::Fatal)?;
        let (tx, rx) = mpsc::channel();
        let submitted = test.clone();
        let reader = std::thread::spawn(move || {
            let outcome = harness.run_test(&submitted);
            let _ = tx.send((harness, outcome));
        });

        let deadline =
            Duration::from_millis(test.timeout_ms.saturating_mul(JOIN_DEADLINE_MULTIPLIER));
        match rx.recv_timeout(deadline) {
            Ok((harness, outcome)) => {
                harness.stop();
                let _ = reader.join();
                match outcome {
                    Ok(captured) => Ok(captured),
                    Err(err) => self.map_protocol_error(err),
                }
            }
            Err(_) => {
                // The reader thread is parked on a pipe that only closes
                // once the harness dies, so it is left to finish on its
                // own after the kill.
                self.registry
                    .kill_all(&self.config.harness.executable_name());
                Ok(CapturedOutput {
                    crashed: true,
                    ..Default::default()
                })
            }
        }
    }

    fn map_protocol_error(&mut self, err: ProtocolError) -> Result<CapturedOutput, WorkerError> {
        match err {
            ProtocolError::Interrupted => Err(WorkerError::Interrupted),
            ProtocolError::Desynchronized { .. } => {
                Err(WorkerError::Desynchronized(err.to_string()))
            }
            // Pipe trouble means the harness is gone; the test crashed and
            // the next one gets a fresh process.
            ProtocolError::Io(_) => {
                if let Some(dead) = self.harness.take() {
                    dead.stop();
                }
                Ok(CapturedOutput {
                    crashed: true,
                    ..Default::default()
                })
            }
        }
    }

    fn write_baselines(&self, test: &TestCase, captured: &CapturedOutput) -> anyhow::Result<()> {
        baseline::write_text_baseline(&self.config.layout_root, &test.path, &captured.text)?;
        if let Some(hash) = &captured.image_hash {
            baseline::write_checksum_baseline(&self.config.layout_root, &test.path, hash)?;
        }
        Ok(())
    }
}
