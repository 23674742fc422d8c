//! The check command: lint expectation files against the test universe.
//!
//! The load-time half of the run pipeline as a standalone step, so a bad
//! expectations edit is caught without spawning a single harness.

use anyhow::Result;
use colored::Colorize;

use crate::cli::CheckArgs;
use crate::config::DEFAULT_TIMEOUT_MS;
use crate::expectations::{ExpectationStore, FileClass, LoadError};
use crate::fs::discovery;
use crate::models::{BuildMode, Platform};

pub fn execute(args: CheckArgs) -> Result<u8> {
    let platform = args.platform.unwrap_or_else(Platform::host);
    let build_mode = args.build_mode.unwrap_or(BuildMode::Release);

    let tests = discovery::discover_tests(&args.layout_root, platform, DEFAULT_TIMEOUT_MS, None)?;
    let universe = discovery::universe(&tests);

    let mut files = Vec::new();
    for path in &args.fixable {
        files.push((FileClass::Fixable, path.clone()));
    }
    for path in &args.ignored {
        files.push((FileClass::Ignored, path.clone()));
    }

    match ExpectationStore::from_files(&files, &universe, platform, build_mode) {
        Ok(store) => {
            println!(
                "{} {} expectation file(s) load cleanly against {} tests",
                "✓".green().bold(),
                files.len(),
                universe.len()
            );
            println!("  fixable:  {}", store.fixable().len());
            println!("  ignored:  {}", store.ignored().len());
            println!("  skipped:  {}", store.skipped().len());
            println!("  deferred: {}", store.deferred().len());
            Ok(0)
        }
        Err(err) => match err.downcast::<LoadError>() {
            Ok(load) => {
                eprintln!("{} {}", "✗".red().bold(), "expectation errors:".bold());
                for issue in &load.issues {
                    eprintln!("  {issue}");
                }
                Ok(1)
            }
            // Not a lint finding (unreadable file, bad path): bubble up.
            Err(other) => Err(other),
        },
    }
}
