use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use mason::cli::Cli;
use mason::fs::OsFs;
use mason::logging::set_up_logging;
use mason::orchestrator::BuildOrchestrator;
use mason::process::OsProcessSpawner;

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    set_up_logging(args.global_options.log_level())?;

    match build(args) {
        Ok(code) => Ok(code),
        Err(err) => {
            // Use `writeln` instead of `eprintln` to avoid panicking when the
            // stderr pipe is broken.
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", "mason failed".red().bold()).ok();
            Err(err)
        }
    }
}

fn build(args: Cli) -> Result<ExitCode> {
    let src_file = args.src_file;

    let orchestrator = match BuildOrchestrator::new(
        Arc::new(OsFs),
        Arc::new(OsProcessSpawner),
        src_file.clone(),
    ) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            report(&err.format(&src_file));
            return Ok(ExitCode::FAILURE);
        }
    };

    let rules = if args.rules.is_empty() {
        vec![orchestrator.default_rule().to_string()]
    } else {
        args.rules
    };

    for rule in &rules {
        if let Err(err) = orchestrator.run_rule(rule) {
            report(&err.format(&src_file));
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report(diagnostic: &str) {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{diagnostic}").ok();
}
