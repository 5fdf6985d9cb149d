/// Undo functionality for reverting file organization operations.
///
/// A live organize pass records every move in an [`UndoLog`] owned by the
/// [`Organizer`]. [`Organizer::undo`] moves each file back, then removes the
/// category folders the pass created if they are empty again. The log can also
/// be written to a history file and read back, so that a later process can
/// undo an earlier one.
use crate::events::{EventSink, Severity};
use crate::file_organizer::{
    MoveRecord, OrganizeError, OrganizeResult, Organizer, is_occupied, move_file,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the history file kept in the organized directory.
pub const HISTORY_FILE_NAME: &str = ".tidyup_history.json";

/// Moves of the last live pass, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UndoLog {
    records: BTreeMap<String, Vec<MoveRecord>>,
    created_folders: Vec<PathBuf>,
}

impl UndoLog {
    pub(crate) fn push(&mut self, record: MoveRecord) {
        self.records
            .entry(record.category.clone())
            .or_default()
            .push(record);
    }

    pub(crate) fn record_folder(&mut self, folder: PathBuf) {
        self.created_folders.push(folder);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.created_folders.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be restored, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files that were in the way of a restore and got renamed.
    pub backed_up: Vec<PathBuf>,
    /// Empty category folders removed after the restore.
    pub removed_folders: usize,
}

impl UndoReport {
    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len()
    }

    /// Returns true if every file was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty()
    }
}

/// What [`Organizer::undo`] did.
#[derive(Debug)]
pub enum UndoOutcome {
    /// No live pass to reverse. Not an error.
    NothingToUndo,
    Completed(UndoReport),
}

impl UndoOutcome {
    pub fn report(&self) -> Option<&UndoReport> {
        match self {
            UndoOutcome::NothingToUndo => None,
            UndoOutcome::Completed(report) => Some(report),
        }
    }
}

/// On-disk form of an [`UndoLog`].
#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    /// RFC 3339 time the history was written.
    timestamp: String,
    base_path: PathBuf,
    records: Vec<MoveRecord>,
    #[serde(default)]
    created_folders: Vec<PathBuf>,
}

impl<S: EventSink> Organizer<S> {
    /// Reverses the most recent live organize pass.
    ///
    /// Every recorded file is moved back to where it came from, recreating
    /// its original folder if needed. A file that now occupies an original
    /// path is renamed with a `.bak.<timestamp>` suffix first. Failures are
    /// logged and reported but do not stop the remaining restores.
    ///
    /// The undo log is cleared afterwards even if some restores failed: the
    /// failed records cannot be retried safely, so they are reported instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyup::file_category::CategoryTable;
    /// use tidyup::file_organizer::{OrganizeOptions, Organizer};
    /// use tidyup::undo::UndoOutcome;
    ///
    /// let mut organizer = Organizer::new("/path/to/directory", CategoryTable::default());
    /// organizer.organize(false, &OrganizeOptions::default())?;
    /// match organizer.undo() {
    ///     UndoOutcome::Completed(report) => println!("Restored {} files", report.restored_files),
    ///     UndoOutcome::NothingToUndo => println!("Nothing to undo"),
    /// }
    /// # Ok::<(), tidyup::file_organizer::OrganizeError>(())
    /// ```
    pub fn undo(&mut self) -> UndoOutcome {
        if self.undo_log.is_empty() {
            self.emit(Severity::Info, "No recent move to undo");
            return UndoOutcome::NothingToUndo;
        }

        let log = std::mem::take(&mut self.undo_log);
        self.emit(
            Severity::Info,
            format!("Undoing {} moves in {}", log.len(), self.target().display()),
        );

        let mut report = UndoReport::default();
        for records in log.records.values() {
            for record in records.iter().rev() {
                match self.restore_file(record, &mut report) {
                    Ok(()) => {
                        report.restored_files += 1;
                        self.emit(
                            Severity::Info,
                            format!(
                                "Restored {} to {}",
                                record.destination.display(),
                                record.source.display()
                            ),
                        );
                    }
                    Err(e) => {
                        self.emit(Severity::Error, e.to_string());
                        report
                            .failed_restores
                            .push((record.destination.clone(), e.to_string()));
                    }
                }
            }
        }

        // Deepest first, so nested mirror folders go before their parents.
        for folder in log.created_folders.iter().rev() {
            match fs::remove_dir(folder) {
                Ok(()) => {
                    report.removed_folders += 1;
                    self.emit(
                        Severity::Info,
                        format!("Removed empty folder {}", folder.display()),
                    );
                }
                Err(e) => self.emit(
                    Severity::Debug,
                    format!("Kept folder {}: {}", folder.display(), e),
                ),
            }
        }

        self.emit(
            Severity::Info,
            format!(
                "Undo complete: {} restored, {} failed",
                report.restored_files,
                report.failed_restores.len()
            ),
        );
        UndoOutcome::Completed(report)
    }

    /// Moves one file back to its original location.
    fn restore_file(
        &mut self,
        record: &MoveRecord,
        report: &mut UndoReport,
    ) -> OrganizeResult<()> {
        let restore_err = |source: std::io::Error| OrganizeError::RestoreFailed {
            from: record.destination.clone(),
            to: record.source.clone(),
            source,
        };

        if !is_occupied(&record.destination) {
            return Err(restore_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file not found at its organized location",
            )));
        }

        if let Some(parent) = record.source.parent()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent).map_err(restore_err)?;
        }

        if is_occupied(&record.source) {
            let backup = backup_path(&record.source);
            fs::rename(&record.source, &backup).map_err(restore_err)?;
            self.emit(
                Severity::Warning,
                format!(
                    "{} was in the way, renamed it to {}",
                    record.source.display(),
                    backup.display()
                ),
            );
            report.backed_up.push(backup);
        }

        move_file(&record.destination, &record.source).map_err(restore_err)
    }

    /// Default location of the history file for this engine's target.
    pub fn history_path(&self) -> PathBuf {
        self.target().join(HISTORY_FILE_NAME)
    }

    /// Writes the undo log of the last live pass to `path` as JSON.
    pub fn save_history(&self, path: &Path) -> OrganizeResult<()> {
        let history = HistoryFile {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path: self.target().to_path_buf(),
            records: self.undo_log.records.values().flatten().cloned().collect(),
            created_folders: self.undo_log.created_folders.clone(),
        };

        let json = serde_json::to_string_pretty(&history).map_err(|e| {
            OrganizeError::HistoryWriteFailed {
                path: path.to_path_buf(),
                source: e.into(),
            }
        })?;

        fs::write(path, json).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Replaces the undo log with the one stored at `path`.
    ///
    /// Returns `Ok(false)` if there is no history file or it holds no moves.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid history JSON, or was
    /// written for a different directory.
    pub fn load_history(&mut self, path: &Path) -> OrganizeResult<bool> {
        if !path.exists() {
            return Ok(false);
        }

        let json = fs::read_to_string(path).map_err(|e| OrganizeError::HistoryReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let history: HistoryFile =
            serde_json::from_str(&json).map_err(|e| OrganizeError::InvalidHistoryFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !same_directory(&history.base_path, self.target()) {
            return Err(OrganizeError::InvalidHistoryFormat {
                path: path.to_path_buf(),
                reason: format!(
                    "recorded for {}, not {}",
                    history.base_path.display(),
                    self.target().display()
                ),
            });
        }

        let mut log = UndoLog::default();
        for record in history.records {
            log.push(record);
        }
        for folder in history.created_folders {
            log.record_folder(folder);
        }
        self.undo_log = log;
        Ok(self.can_undo())
    }
}

/// Deletes a history file if there is one.
pub fn remove_history(path: &Path) -> OrganizeResult<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Generates a backup path for a file by appending a timestamp.
///
/// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
fn backup_path(original_path: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let mut candidate = original_path.with_file_name(format!("{filename}.bak.{timestamp}"));
    let mut counter = 1;
    while is_occupied(&candidate) {
        candidate = original_path.with_file_name(format!("{filename}.bak.{timestamp}.{counter}"));
        counter += 1;
    }
    candidate
}
