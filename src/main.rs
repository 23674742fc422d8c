use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use plumb::cli::{Cli, Commands};
use plumb::commands::{check, rebaseline, run};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args),
        Commands::Check(args) => check::execute(args),
        Commands::Rebaseline(args) => rebaseline::execute(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
