//! Command-line surface.
//!
//! Thin by design: flags are translated into the config structs in
//! `config` and handed to `commands::*::execute`. Nothing here holds run
//! state.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::{BuildMode, Platform};

#[derive(Parser)]
#[command(name = "plumb")]
#[command(about = "Parallel layout-test runner and regression triage", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the layout tests and reconcile against expectations
    Run(RunArgs),

    /// Lint the expectation files without running any test
    Check(CheckArgs),

    /// Run the tests and overwrite baselines with captured output
    Rebaseline(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Root of the layout-test tree
    pub layout_root: PathBuf,

    /// Harness executable; a bare name is resolved on PATH
    #[arg(long)]
    pub harness: Option<String>,

    /// Extra argument passed to the harness (repeatable)
    #[arg(long = "harness-arg")]
    pub harness_args: Vec<String>,

    /// Number of worker threads (default: available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Run every test in a fresh harness process
    #[arg(long)]
    pub isolated: bool,

    /// Fixable expectation file (repeatable)
    #[arg(long)]
    pub fixable: Vec<PathBuf>,

    /// Ignored expectation file (repeatable)
    #[arg(long)]
    pub ignored: Vec<PathBuf>,

    /// Target platform (default: the host platform)
    #[arg(long, value_parser = platform_parser)]
    pub platform: Option<Platform>,

    /// Build mode of the harness under test
    #[arg(long, value_parser = build_mode_parser)]
    pub build_mode: Option<BuildMode>,

    /// Capture new baselines instead of diffing against them
    #[arg(long)]
    pub new_baseline: bool,

    /// Regex over test paths selecting a subset
    #[arg(long)]
    pub filter: Option<String>,

    /// Default per-test timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Restart the shared harness after this many tests
    #[arg(long)]
    pub bounce_after: Option<usize>,

    /// Skip image checksum comparison
    #[arg(long)]
    pub no_images: bool,

    /// Directory for run artifacts (report, timings, run lock)
    #[arg(long, default_value = "plumb-output")]
    pub output_dir: PathBuf,

    /// Optional plumb.toml with harness and run settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Root of the layout-test tree
    pub layout_root: PathBuf,

    /// Fixable expectation file (repeatable)
    #[arg(long)]
    pub fixable: Vec<PathBuf>,

    /// Ignored expectation file (repeatable)
    #[arg(long)]
    pub ignored: Vec<PathBuf>,

    /// Target platform (default: the host platform)
    #[arg(long, value_parser = platform_parser)]
    pub platform: Option<Platform>,

    /// Build mode of the harness under test
    #[arg(long, value_parser = build_mode_parser)]
    pub build_mode: Option<BuildMode>,
}

fn platform_parser(s: &str) -> Result<Platform, String> {
    Platform::parse(s).ok_or_else(|| format!("unknown platform '{s}' (expected linux, mac or win)"))
}

fn build_mode_parser(s: &str) -> Result<BuildMode, String> {
    BuildMode::parse(s).ok_or_else(|| format!("unknown build mode '{s}' (expected debug or release)"))
}
