//! The rebaseline command.
//!
//! Same capture pipeline as `run` with the classifier in
//! baseline-generation mode: captured text and checksums overwrite the
//! sibling `-expected.*` files. Expectation files are never touched.

use anyhow::Result;

use crate::cli::RunArgs;

pub fn execute(args: RunArgs) -> Result<u8> {
    super::run::execute_with(args, true)
}
