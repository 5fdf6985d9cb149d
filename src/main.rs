use clap::Parser;
use std::process::ExitCode;
use tidyup::cli::{Cli, run_cli};
use tidyup::output::OutputFormatter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostics go to stderr so --json output stays clean.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    match run_cli(&cli) {
        Ok(report) if report.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
