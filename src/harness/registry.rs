//! Killing every instance of the harness executable.
//!
//! The hang watchdog guarantees forward progress by killing the harness by
//! executable name, which also takes out sibling workers' instances. That
//! is a process-wide side effect, so it lives behind a trait: the runner
//! injects the system implementation, tests inject a recording fake and
//! assert on the calls instead of killing real processes.

use std::process::Command;
use std::sync::Mutex;

/// Process-wide operations on the harness executable.
pub trait ProcessRegistry: Send + Sync {
    /// Forcibly kill every running instance of the named executable.
    /// Returns the number of instances found (best effort).
    fn kill_all(&self, exe_name: &str) -> usize;
}

/// Registry backed by the real process table.
pub struct SystemProcessRegistry;

impl ProcessRegistry for SystemProcessRegistry {
    fn kill_all(&self, exe_name: &str) -> usize {
        let found = Command::new("pgrep")
            .arg("-x")
            .arg(exe_name)
            .output()
            .map(|output| {
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .count()
            })
            .unwrap_or(0);
        let _ = Command::new("pkill")
            .arg("-9")
            .arg("-x")
            .arg(exe_name)
            .status();
        found
    }
}

/// Fake registry that records calls instead of signalling anything.
#[derive(Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ProcessRegistry for RecordingRegistry {
    fn kill_all(&self, exe_name: &str) -> usize {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(exe_name.to_string());
        }
        0
    }
}
