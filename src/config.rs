//! Run-scoped configuration.
//!
//! Every knob travels in these structs, built once per run from CLI flags
//! plus an optional `plumb.toml`. Nothing here is global or mutable after
//! construction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::classify::ClassifyConfig;
use crate::expectations::FileClass;
use crate::models::{BuildMode, Platform};

/// How workers drive the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One long-lived harness per worker serving a stream of tests.
    Shared,
    /// A fresh harness per test, supervised by a join deadline.
    Isolated,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Shared => "shared",
            ExecutionMode::Isolated => "isolated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Some(ExecutionMode::Shared),
            "isolated" => Some(ExecutionMode::Isolated),
            _ => None,
        }
    }
}

/// The harness executable and its fixed arguments.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl HarnessConfig {
    /// Basename used for the process-wide kill.
    pub fn executable_name(&self) -> String {
        self.executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.display().to_string())
    }
}

/// When a healthy shared harness gets restarted.
///
/// The full set of bounce triggers: the two below, plus the forced respawn
/// of a process that died. Nothing else restarts a shared harness.
#[derive(Debug, Clone)]
pub struct BouncePolicy {
    /// Restart after this many tests on one instance; 0 disables.
    pub batch_size: usize,
    /// Restart after a test the harness reported as timed out, in case it
    /// is left wedged mid-load.
    pub after_timeout: bool,
}

impl Default for BouncePolicy {
    fn default() -> Self {
        BouncePolicy {
            batch_size: 0,
            after_timeout: true,
        }
    }
}

impl BouncePolicy {
    pub fn should_bounce(&self, tests_served: usize, last_test_timed_out: bool) -> bool {
        if self.batch_size > 0 && tests_served >= self.batch_size {
            return true;
        }
        self.after_timeout && last_test_timed_out
    }
}

/// Everything one run needs, assembled before any thread starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub layout_root: PathBuf,
    pub output_dir: PathBuf,
    pub harness: HarnessConfig,
    pub workers: usize,
    pub mode: ExecutionMode,
    pub platform: Platform,
    pub build_mode: BuildMode,
    /// Capture results to overwrite baselines instead of diffing.
    pub new_baseline: bool,
    pub verbose: bool,
    /// Default per-test timeout handed to the harness.
    pub timeout_ms: u64,
    /// Optional selection over normalized test paths.
    pub filter: Option<Regex>,
    /// Expectation files to load, in declaration order.
    pub expectations: Vec<(FileClass, PathBuf)>,
    pub bounce: BouncePolicy,
    pub classify: ClassifyConfig,
}

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            layout_root: PathBuf::from("."),
            output_dir: PathBuf::from("plumb-output"),
            harness: HarnessConfig {
                executable: PathBuf::from("render-shell"),
                args: Vec::new(),
            },
            workers: DEFAULT_WORKERS,
            mode: ExecutionMode::Shared,
            platform: Platform::host(),
            build_mode: BuildMode::Release,
            new_baseline: false,
            verbose: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            filter: None,
            expectations: Vec::new(),
            bounce: BouncePolicy::default(),
            classify: ClassifyConfig::default(),
        }
    }
}

/// Optional `plumb.toml`, merged under CLI flags.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub harness: HarnessSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct HarnessSection {
    pub executable: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunSection {
    pub workers: Option<usize>,
    pub mode: Option<String>,
    pub timeout_ms: Option<u64>,
    pub batch_size: Option<usize>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
