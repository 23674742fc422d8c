//! The run command: discover, execute, classify, reconcile.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use fs2::FileExt;
use regex::Regex;

use crate::cli::RunArgs;
use crate::config::{
    BouncePolicy, ConfigFile, ExecutionMode, HarnessConfig, RunConfig, DEFAULT_TIMEOUT_MS,
};
use crate::expectations::{ExpectationStore, FileClass};
use crate::fs::discovery;
use crate::harness::SystemProcessRegistry;
use crate::models::{BuildMode, Platform};
use crate::reconcile::{reconcile, RegressionReport};
use crate::worker::pool::{run_pool, PoolOutcome, RunStatus};

/// Highest exit code carrying a regression count; anything above collides
/// with shell signal conventions.
const MAX_EXIT_CODE: u8 = 125;

/// Exit code reported for an interrupted run, matching the shell's own
/// convention for SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

pub fn execute(args: RunArgs) -> Result<u8> {
    execute_with(args, false)
}

/// Shared body of `run` and `rebaseline`.
pub(crate) fn execute_with(args: RunArgs, force_new_baseline: bool) -> Result<u8> {
    let mut config = build_config(&args)?;
    if force_new_baseline {
        config.new_baseline = true;
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output dir: {}", config.output_dir.display())
    })?;
    let _lock = acquire_run_lock(&config.output_dir)?;

    let tests = discovery::discover_tests(
        &config.layout_root,
        config.platform,
        config.timeout_ms,
        config.filter.as_ref(),
    )?;
    if tests.is_empty() {
        println!(
            "{} no tests found under {}",
            "−".dimmed(),
            config.layout_root.display()
        );
        return Ok(0);
    }
    let universe = discovery::universe(&tests);

    // Load-time invariant violations abort here, before any test runs.
    let store = ExpectationStore::from_files(
        &config.expectations,
        &universe,
        config.platform,
        config.build_mode,
    )?;

    let runnable: Vec<_> = tests
        .into_iter()
        .filter(|t| !store.is_skipped(&t.path))
        .collect();
    println!(
        "{} {} tests ({} skipped), {} workers, {} mode",
        "→".cyan().bold(),
        runnable.len(),
        store.skipped().len(),
        config.workers,
        config.mode.as_str()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
            eprintln!("{} interrupt handler unavailable: {err}", "!".yellow());
        }
    }

    let config = Arc::new(config);
    let outcome = run_pool(
        config.clone(),
        runnable,
        cancel.clone(),
        Arc::new(SystemProcessRegistry),
    );

    match &outcome.status {
        RunStatus::Desynchronized { detail } | RunStatus::Failed { detail } => {
            bail!("run aborted: {detail}");
        }
        RunStatus::Interrupted | RunStatus::Cancelled => {
            eprintln!("{} run interrupted; no report produced", "✗".red().bold());
            reraise_interrupt();
            return Ok(INTERRUPTED_EXIT_CODE);
        }
        RunStatus::Completed => {}
    }

    let report = reconcile(&universe, &outcome.results, &store, config.new_baseline);
    write_artifacts(&config.output_dir, &outcome, &report)?;
    print_summary(&config, &outcome, &report);

    Ok(exit_code(report.regressed_count()))
}

fn exit_code(regressed: usize) -> u8 {
    regressed.min(MAX_EXIT_CODE as usize) as u8
}

/// Assemble the run config from flags plus the optional `plumb.toml`.
/// Flags win over file values.
fn build_config(args: &RunArgs) -> Result<RunConfig> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => {
            let default = args.layout_root.join("plumb.toml");
            if default.is_file() {
                ConfigFile::load(&default)?
            } else {
                ConfigFile::default()
            }
        }
    };

    let executable = args
        .harness
        .clone()
        .or_else(|| file.harness.executable.clone())
        .context("No harness executable given (use --harness or plumb.toml)")?;
    let executable = resolve_executable(&executable)?;
    let mut harness_args = file.harness.args.clone();
    harness_args.extend(args.harness_args.iter().cloned());

    let mode = if args.isolated {
        ExecutionMode::Isolated
    } else {
        match file.run.mode.as_deref() {
            Some(name) => ExecutionMode::parse(name)
                .with_context(|| format!("Unknown execution mode in config: {name}"))?,
            None => ExecutionMode::Shared,
        }
    };

    let filter = args
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter regex")?;

    let mut expectations = Vec::new();
    for path in &args.fixable {
        expectations.push((FileClass::Fixable, path.clone()));
    }
    for path in &args.ignored {
        expectations.push((FileClass::Ignored, path.clone()));
    }

    let mut bounce = BouncePolicy::default();
    if let Some(batch_size) = args.bounce_after.or(file.run.batch_size) {
        bounce.batch_size = batch_size;
    }

    let mut config = RunConfig {
        layout_root: args.layout_root.clone(),
        output_dir: args.output_dir.clone(),
        harness: HarnessConfig {
            executable,
            args: harness_args,
        },
        workers: args
            .workers
            .or(file.run.workers)
            .unwrap_or_else(default_workers),
        mode,
        platform: args.platform.unwrap_or_else(Platform::host),
        build_mode: args.build_mode.unwrap_or(BuildMode::Release),
        new_baseline: args.new_baseline,
        verbose: args.verbose,
        timeout_ms: args
            .timeout_ms
            .or(file.run.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS),
        filter,
        expectations,
        bounce,
        ..Default::default()
    };
    config.classify.compare_images = !args.no_images;
    Ok(config)
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(crate::config::DEFAULT_WORKERS)
}

fn resolve_executable(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.components().count() > 1 || path.is_file() {
        return Ok(path.to_path_buf());
    }
    which::which(name).with_context(|| format!("Harness '{name}' not found on PATH"))
}

/// Exclusive lock guarding the output dir against a concurrent run. Held
/// for the lifetime of the returned file.
fn acquire_run_lock(output_dir: &Path) -> Result<std::fs::File> {
    let path = output_dir.join(".plumb.lock");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("Failed to open run lock: {}", path.display()))?;
    file.try_lock_exclusive().with_context(|| {
        format!("Another run already holds {}", path.display())
    })?;
    Ok(file)
}

fn write_artifacts(output_dir: &Path, outcome: &PoolOutcome, report: &RegressionReport) -> Result<()> {
    outcome.timings.write_json(&output_dir.join("timings.json"))?;
    let json = serde_json::to_string_pretty(report).context("Failed to encode report")?;
    let path = output_dir.join("report.json");
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

fn print_summary(config: &RunConfig, outcome: &PoolOutcome, report: &RegressionReport) {
    println!();
    println!("{}", "Timing:".bold());
    println!(
        "  {} tests in {} ms of harness time",
        outcome.tests_run,
        outcome.timings.total_ms()
    );
    for dir in outcome.timings.slowest_directories(5) {
        let directory = if dir.directory.is_empty() {
            "<root>"
        } else {
            &dir.directory
        };
        println!(
            "  {} {directory}: {} ms over {} tests",
            "·".dimmed(),
            dir.total_ms,
            dir.tests
        );
    }

    println!();
    println!("{}", "Regressions:".bold());
    print_set("regressed crashes", &report.regressed_crashes, true);
    print_set("regressed timeouts", &report.regressed_timeouts, true);
    print_set("regressed failures", &report.regressed_failures, true);
    print_set("missing results", &report.missing_results, config.verbose);
    print_set("unexpected passes", &report.unexpected_pass, config.verbose);

    println!();
    if report.is_clean() {
        println!("{} {}", "✓".green().bold(), report.summary());
    } else {
        println!("{} {}", "✗".red().bold(), report.summary());
    }
}

fn print_set(label: &str, set: &std::collections::BTreeSet<String>, list_members: bool) {
    if set.is_empty() {
        return;
    }
    println!("  {} {}: {}", "✗".red(), label, set.len());
    if list_members {
        for test in set {
            println!("      {test}");
        }
    }
}

/// Hand the interrupt back to the shell once every worker has joined.
fn reraise_interrupt() {
    use nix::sys::signal::{self, SigHandler, Signal};
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
    }
    let _ = signal::raise(Signal::SIGINT);
}
