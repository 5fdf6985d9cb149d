//! tidyup - sort the files of a directory into category folders
//!
//! This library classifies files by extension against a category table, moves
//! them into one folder per category, and can reverse the most recent run.
//! Runs can be previewed without touching the disk, restricted to some
//! categories, extended to subdirectories, and shaped by TOML configuration.
//! Progress is reported as timestamped records to a pluggable event sink.

pub mod cli;
pub mod config;
pub mod events;
pub mod file_category;
pub mod file_organizer;
pub mod output;
pub mod undo;

pub use config::{CompiledFilters, Config, ConfigError};
pub use events::{EventSink, LogFileSink, LogRecord, MemorySink, NullSink, Severity, TracingSink};
pub use file_category::{Category, CategoryTable, Classifier, OTHERS};
pub use file_organizer::{
    CategoryFilter, MoveRecord, OrganizeError, OrganizeOptions, Organizer, RecursionMode,
    RunStatistics,
};
pub use undo::{UndoOutcome, UndoReport};

pub use cli::{CommandReport, OrganizeCommand, execute, run_cli};
