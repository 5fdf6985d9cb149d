//! Command-line interface module for tidyup.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Building an [`Organizer`] from the loaded configuration
//! - Persisting the undo history between invocations
//! - Rendering results to the terminal or as JSON

use crate::config::Config;
use crate::events::{EventSink, LogFileSink, LogRecord, Severity, TracingSink};
use crate::file_category::Classifier;
use crate::file_organizer::{CategoryFilter, OrganizeOptions, Organizer, RecursionMode, RunStatistics};
use crate::output::OutputFormatter;
use crate::undo::{UndoOutcome, remove_history};
use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use indicatif::ProgressBar;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Sort the files of a directory into category folders.
#[derive(Debug, Parser)]
#[command(name = "tidyup", version)]
pub struct Cli {
    /// Directory to organize
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Show what would be moved without touching any file
    #[arg(short = 'n', long, conflicts_with = "undo")]
    pub dry_run: bool,

    /// Move the files of the last run back where they came from
    #[arg(long)]
    pub undo: bool,

    /// Also organize files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Layout for files found in subdirectories (defaults to the config value)
    #[arg(long, value_enum, requires = "recursive")]
    pub layout: Option<RecursionMode>,

    /// Only move files of these categories
    #[arg(long, value_delimiter = ',', value_name = "CATEGORY")]
    pub only: Vec<String>,

    /// Configuration file to use instead of the default lookup
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append a log of every move to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the category table and exit
    #[arg(long, conflicts_with_all = ["undo", "dry_run"])]
    pub list_categories: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase diagnostic output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The operation the flags ask for.
    pub fn organize_command(&self) -> OrganizeCommand {
        if self.list_categories {
            OrganizeCommand::ListCategories
        } else if self.undo {
            OrganizeCommand::Undo
        } else {
            OrganizeCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }

    /// Per-run options, with the config supplying the default layout.
    pub fn options(&self, config: &Config) -> OrganizeOptions {
        let only: Vec<&str> = self
            .only
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();

        OrganizeOptions {
            category_filter: (!only.is_empty()).then(|| only.into_iter().collect::<CategoryFilter>()),
            recursion: self
                .recursive
                .then(|| self.layout.unwrap_or(config.recursion)),
        }
    }

    /// Max level for the diagnostic subscriber.
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files in a directory.
    Organize {
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Undo the previous organization.
    Undo,
    /// Show the category table.
    ListCategories,
}

/// What a command produced.
#[derive(Debug)]
pub enum CommandReport {
    Organized(RunStatistics),
    Undone(UndoOutcome),
    Categories(Classifier),
}

impl CommandReport {
    /// True if some file could not be moved or restored.
    pub fn has_failures(&self) -> bool {
        match self {
            CommandReport::Organized(stats) => stats.errors > 0,
            CommandReport::Undone(outcome) => outcome
                .report()
                .is_some_and(|report| !report.is_complete_success()),
            CommandReport::Categories(_) => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CommandReport::Organized(stats) => json!({ "organize": stats }),
            CommandReport::Undone(UndoOutcome::NothingToUndo) => json!({ "undo": null }),
            CommandReport::Undone(UndoOutcome::Completed(report)) => json!({
                "undo": {
                    "restored_files": report.restored_files,
                    "failed_restores": report
                        .failed_restores
                        .iter()
                        .map(|(path, reason)| json!({ "path": path, "reason": reason }))
                        .collect::<Vec<_>>(),
                    "backed_up": report.backed_up,
                    "removed_folders": report.removed_folders,
                }
            }),
            CommandReport::Categories(classifier) => json!({
                "categories": classifier
                    .categories()
                    .into_iter()
                    .map(|name| json!({ "name": name, "extensions": classifier.extensions_of(name) }))
                    .collect::<Vec<_>>()
            }),
        }
    }

    /// Prints the report for a person at a terminal.
    pub fn render(&self) {
        match self {
            CommandReport::Organized(stats) => OutputFormatter::run_statistics(stats),
            CommandReport::Undone(outcome) => OutputFormatter::undo_outcome(outcome),
            CommandReport::Categories(classifier) => OutputFormatter::category_list(classifier),
        }
    }
}

/// Runs the CLI application for parsed arguments.
///
/// Loads the configuration, wires the terminal as the engine's event sink,
/// adds the log file for live runs and undo, executes the command and prints
/// the result.
///
/// # Errors
///
/// Fails on configuration problems, an unusable target directory, an
/// unreadable history file, or a log file that cannot be opened. Per-file
/// failures are reported through [`CommandReport::has_failures`] instead.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use tidyup::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["tidyup", "/path/to/directory", "--dry-run"]);
/// match run_cli(&cli) {
///     Ok(report) => println!("failures: {}", report.has_failures()),
///     Err(e) => eprintln!("Error: {e:#}"),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> anyhow::Result<CommandReport> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let command = cli.organize_command();
    let options = cli.options(&config);

    if command == OrganizeCommand::ListCategories {
        let report = execute(command, &cli.directory, &config, &options, TracingSink)?;
        return finish(cli, report);
    }

    let spinner = match command {
        OrganizeCommand::Organize { dry_run: false } | OrganizeCommand::Undo if !cli.json => {
            Some(OutputFormatter::create_spinner("Working..."))
        }
        _ => None,
    };

    if !cli.json {
        match command {
            OrganizeCommand::Organize { dry_run: true } => OutputFormatter::dry_run_notice(&format!(
                "Analyzing contents of: {}",
                cli.directory.display()
            )),
            OrganizeCommand::Organize { dry_run: false } => OutputFormatter::info(&format!(
                "Organizing contents of: {}",
                cli.directory.display()
            )),
            _ => OutputFormatter::info("Undoing previous organization..."),
        }
    }

    let console: Box<dyn EventSink> = if cli.json {
        Box::new(TracingSink)
    } else {
        Box::new(ConsoleSink::new(
            spinner.clone(),
            command == OrganizeCommand::Organize { dry_run: true },
        ))
    };

    // Only runs that change the tree are logged to the file.
    let log_file = match command {
        OrganizeCommand::Organize { dry_run: false } | OrganizeCommand::Undo => cli
            .log_file
            .clone()
            .or_else(|| config.log_file_for(&cli.directory)),
        _ => None,
    };
    let sink: Box<dyn EventSink> = match log_file {
        Some(path) => {
            let file = LogFileSink::open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Box::new((console, file))
        }
        None => console,
    };

    let result = execute(command, &cli.directory, &config, &options, sink);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    finish(cli, result?)
}

fn finish(cli: &Cli, report: CommandReport) -> anyhow::Result<CommandReport> {
    if cli.json {
        let text = serde_json::to_string_pretty(&report.to_json())
            .context("failed to serialize the report")?;
        println!("{text}");
    } else {
        report.render();
    }
    Ok(report)
}

/// Executes one command against `directory` without printing anything.
///
/// A live organize run stores its undo log in the target's history file so a
/// later invocation can reverse it; a run that moved nothing removes any
/// older history. Undo reads that file, reverses the run and deletes it.
///
/// # Errors
///
/// Fails on an invalid category table or filter rule, an unusable target
/// directory, or a history file that cannot be read.
pub fn execute<S: EventSink>(
    command: OrganizeCommand,
    directory: &Path,
    config: &Config,
    options: &OrganizeOptions,
    sink: S,
) -> anyhow::Result<CommandReport> {
    let table = config
        .category_table()
        .context("invalid category table")?;
    let filters = config.compile_filters().context("invalid filter rules")?;
    let mut organizer = Organizer::with_sink(directory, table, sink).with_filters(filters);

    match command {
        OrganizeCommand::ListCategories => {
            Ok(CommandReport::Categories(organizer.classifier().clone()))
        }
        OrganizeCommand::Organize { dry_run } => {
            let stats = organizer
                .organize(dry_run, options)
                .with_context(|| format!("failed to organize {}", directory.display()))?;

            if !dry_run {
                let history = organizer.history_path();
                let saved = if organizer.can_undo() {
                    organizer.save_history(&history)
                } else {
                    remove_history(&history)
                };
                if let Err(e) = saved {
                    tracing::warn!("undo history not updated: {e}");
                }
            }
            Ok(CommandReport::Organized(stats))
        }
        OrganizeCommand::Undo => {
            if !directory.is_dir() {
                bail!("{} is not a directory", directory.display());
            }
            let history = organizer.history_path();
            organizer
                .load_history(&history)
                .with_context(|| format!("failed to load undo history for {}", directory.display()))?;

            let outcome = organizer.undo();
            if let Err(e) = remove_history(&history) {
                tracing::warn!("could not remove undo history: {e}");
            }
            Ok(CommandReport::Undone(outcome))
        }
    }
}

/// Shows engine events on the terminal.
///
/// Progress goes to the spinner, warnings and errors are printed above it.
/// Debug records are printed as plan lines when `show_details` is set and
/// handed to `tracing` otherwise.
pub struct ConsoleSink {
    spinner: Option<ProgressBar>,
    show_details: bool,
}

impl ConsoleSink {
    pub fn new(spinner: Option<ProgressBar>, show_details: bool) -> Self {
        Self {
            spinner,
            show_details,
        }
    }

    fn print(&self, f: impl FnOnce()) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(f),
            None => f(),
        }
    }
}

impl EventSink for ConsoleSink {
    fn record(&mut self, record: LogRecord) {
        match record.severity {
            Severity::Debug if self.show_details => {
                self.print(|| OutputFormatter::plain(&format!("  {}", record.message)))
            }
            Severity::Debug => tracing::debug!("{}", record.message),
            Severity::Info => match &self.spinner {
                Some(spinner) => spinner.set_message(record.message),
                None => tracing::info!("{}", record.message),
            },
            Severity::Warning => self.print(|| OutputFormatter::warning(&record.message)),
            Severity::Error => self.print(|| OutputFormatter::error(&record.message)),
        }
    }
}
