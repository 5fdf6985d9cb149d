//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! the live-run spinner, and the summary tables printed after a run or an undo.

use crate::file_category::Classifier;
use crate::file_organizer::RunStatistics;
use crate::undo::{UndoOutcome, UndoReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - A spinner for live runs
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// OutputFormatter::error("Failed to organize file");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a ticking spinner for a run whose length is unknown up front.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// let spinner = OutputFormatter::create_spinner("Organizing");
    /// spinner.set_message("Moved report.pdf");
    /// spinner.finish_and_clear();
    /// ```
    pub fn create_spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Prints a summary table with file counts by category.
    ///
    /// Each row is followed by the names listed for its category in `files`.
    ///
    /// # Arguments
    ///
    /// * `category_counts` - Category names mapped to file counts
    /// * `files` - Category names mapped to the files sorted into them
    /// * `total_files` - Total number of files in the table
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyup::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    /// use std::path::PathBuf;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 1);
    /// let mut files = BTreeMap::new();
    /// files.insert("Documents".to_string(), vec![PathBuf::from("report.pdf")]);
    /// OutputFormatter::summary_table(&counts, &files, 1);
    /// ```
    pub fn summary_table(
        category_counts: &BTreeMap<String, usize>,
        files: &BTreeMap<String, Vec<PathBuf>>,
        total_files: usize,
    ) {
        Self::header("SUMMARY");

        let width = category_column_width(category_counts.keys().map(String::as_str));

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = width
            );
            for name in files.get(category).into_iter().flatten() {
                println!("  {} {}", "└─".dimmed(), name.display());
            }
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints the outcome of an organize pass.
    pub fn run_statistics(stats: &RunStatistics) {
        if stats.dry_run {
            if stats.categorized() == 0 {
                Self::dry_run_notice("No files would be moved.");
            } else {
                Self::dry_run_notice(&format!(
                    "{} would be moved. Nothing was changed.",
                    count_files(stats.categorized())
                ));
                Self::summary_table(&stats.by_category, &stats.moved_files, stats.categorized());
            }
            if stats.skipped > 0 {
                Self::plain(&format!("Skipped: {}", stats.skipped));
            }
            return;
        }

        if stats.moved == 0 && stats.errors == 0 {
            Self::info("Nothing to organize.");
        } else {
            Self::summary_table(&stats.by_category, &stats.moved_files, stats.moved);
        }

        Self::plain(&format!(
            "Moved: {}  Skipped: {}  Folders created: {}",
            stats.moved, stats.skipped, stats.folders_created
        ));
        if stats.errors > 0 {
            Self::warning(&format!(
                "{} could not be organized. See the log above.",
                count_files(stats.errors)
            ));
        } else if stats.moved > 0 {
            Self::success("Organization complete. Run again with --undo to revert.");
        }
    }

    /// Prints the outcome of an undo.
    pub fn undo_outcome(outcome: &UndoOutcome) {
        match outcome {
            UndoOutcome::NothingToUndo => Self::info("Nothing to undo."),
            UndoOutcome::Completed(report) => Self::undo_report(report),
        }
    }

    fn undo_report(report: &UndoReport) {
        Self::header("UNDO");
        Self::plain(&format!("Restored: {}", report.restored_files));
        if report.removed_folders > 0 {
            Self::plain(&format!("Folders removed: {}", report.removed_folders));
        }
        for backup in &report.backed_up {
            Self::warning(&format!("Kept conflicting file as {}", backup.display()));
        }
        for (path, reason) in &report.failed_restores {
            Self::error(&format!("{}: {}", path.display(), reason));
        }

        if report.is_complete_success() {
            Self::success("Undo complete.");
        } else {
            Self::warning(&format!(
                "{} of {} files could not be restored.",
                report.failed_restores.len(),
                report.total_processed()
            ));
        }
    }

    /// Prints every category with the extensions it claims.
    pub fn category_list(classifier: &Classifier) {
        let names = classifier.categories();
        let width = category_column_width(names.iter().copied());

        Self::header("CATEGORIES");
        for name in names {
            let extensions = classifier
                .extensions_of(name)
                .map(|exts| exts.iter().cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_else(|| "(everything else)".dimmed().to_string());
            println!("{:<width$} | {}", name.bold(), extensions, width = width);
        }
    }
}

fn category_column_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    // At least as wide as the "Category" heading
    names.map(str::len).max().unwrap_or(0).max(8)
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn count_files(count: usize) -> String {
    format!("{} {}", count, plural(count))
}
