/// Moving files into category folders.
///
/// This module holds the [`Organizer`] engine. It lists the files of a target
/// directory, classifies each one by extension, creates category folders on
/// demand and moves (or, in a dry run, only counts) each file. Every
/// successful move is remembered so the run can be reversed with
/// [`Organizer::undo`](crate::undo).
///
/// A failure on one file never stops the run: it is logged to the engine's
/// [`EventSink`], counted in [`RunStatistics::errors`], and the file stays
/// where it was.
use crate::config::CompiledFilters;
use crate::events::{EventSink, LogRecord, Severity, TracingSink};
use crate::file_category::{CategoryTable, Classifier};
use crate::undo::{HISTORY_FILE_NAME, UndoLog};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// A file that was moved, or would be moved, into a category folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the file was before the run.
    pub source: PathBuf,
    /// Where the file ended up.
    pub destination: PathBuf,
    /// The category folder it was sorted into.
    pub category: String,
}

/// Counters accumulated over one organize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub moved: usize,
    pub skipped: usize,
    pub errors: usize,
    pub folders_created: usize,
    /// Files per category: moved in a live run, planned in a dry run.
    pub by_category: BTreeMap<String, usize>,
    /// Names of those files inside their category folder, in move order.
    pub moved_files: BTreeMap<String, Vec<PathBuf>>,
    pub dry_run: bool,
}

impl RunStatistics {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Number of files sorted into a category (or planned to be).
    pub fn categorized(&self) -> usize {
        self.by_category.values().sum()
    }
}

/// How a recursive pass lays out files found in subdirectories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RecursionMode {
    /// Every file goes straight into `target/category/`.
    #[default]
    Flatten,
    /// Files keep their relative subdirectory under the category folder.
    Mirror,
}

/// The set of categories a pass is allowed to touch.
///
/// Files of any other category are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    enabled: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, category: &str) -> bool {
        self.enabled.contains(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CategoryFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Per-call knobs for [`Organizer::organize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeOptions {
    /// Only these categories are moved when set.
    pub category_filter: Option<CategoryFilter>,
    /// Walk subdirectories too, with the given layout.
    pub recursion: Option<RecursionMode>,
}

/// Errors that can occur during file organization operations.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The target is missing or is not a directory.
    #[error("invalid directory {}: {reason}", path.display())]
    InvalidDirectory { path: PathBuf, reason: String },
    /// The target directory could not be listed.
    #[error("failed to read directory {}: {source}", path.display())]
    ScanFailed { path: PathBuf, source: io::Error },
    /// A category folder could not be created.
    #[error("failed to create folder {}: {source}", path.display())]
    FolderCreationFailed { path: PathBuf, source: io::Error },
    /// A file could not be moved into its category folder.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// A file could not be moved back during undo.
    #[error("failed to restore {} to {}: {source}", from.display(), to.display())]
    RestoreFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("failed to write history file {}: {source}", path.display())]
    HistoryWriteFailed { path: PathBuf, source: io::Error },
    #[error("failed to read history file {}: {source}", path.display())]
    HistoryReadFailed { path: PathBuf, source: io::Error },
    #[error("invalid history file {}: {reason}", path.display())]
    InvalidHistoryFormat { path: PathBuf, reason: String },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// A file picked up by the scan, waiting to be classified.
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    /// Path relative to the target directory.
    relative: PathBuf,
    name: String,
}

/// Sorts the files of one directory into category folders.
///
/// The engine owns its classifier, the statistics of the last pass, the undo
/// log of the last live pass and the sink it reports to. Every operation
/// takes `&mut self`, so one engine runs one pass at a time; share it across
/// threads behind a mutex.
///
/// # Examples
///
/// ```no_run
/// use tidyup::file_category::CategoryTable;
/// use tidyup::file_organizer::{OrganizeOptions, Organizer};
///
/// let mut organizer = Organizer::new("/home/me/Downloads", CategoryTable::default());
/// let stats = organizer.organize(false, &OrganizeOptions::default())?;
/// println!("moved {} files", stats.moved);
/// # Ok::<(), tidyup::file_organizer::OrganizeError>(())
/// ```
pub struct Organizer<S = TracingSink> {
    target: PathBuf,
    classifier: Classifier,
    filters: CompiledFilters,
    stats: RunStatistics,
    pub(crate) undo_log: UndoLog,
    pub(crate) sink: S,
}

impl Organizer<TracingSink> {
    /// Creates an engine that reports through `tracing`.
    pub fn new(target: impl Into<PathBuf>, table: CategoryTable) -> Self {
        Self::with_sink(target, table, TracingSink)
    }
}

impl<S: EventSink> Organizer<S> {
    /// Creates an engine that reports to `sink`.
    pub fn with_sink(target: impl Into<PathBuf>, table: CategoryTable, sink: S) -> Self {
        Self {
            target: target.into(),
            classifier: Classifier::new(table),
            filters: CompiledFilters::default(),
            stats: RunStatistics::default(),
            undo_log: UndoLog::default(),
            sink,
        }
    }

    /// Adds exclusion rules; matching files are skipped.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Category a file name would be sorted into.
    pub fn classify(&self, file_name: &str) -> &str {
        self.classifier.classify(file_name)
    }

    /// Category names in table order, `Others` last.
    pub fn supported_categories(&self) -> Vec<&str> {
        self.classifier.categories()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Snapshot of the statistics of the most recent pass.
    pub fn statistics(&self) -> RunStatistics {
        self.stats.clone()
    }

    /// True when the last live pass moved something that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_log.is_empty()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Logical dry run: classifies and counts without touching the disk.
    pub fn preview(&mut self, options: &OrganizeOptions) -> OrganizeResult<RunStatistics> {
        self.organize(true, options)
    }

    /// Sorts the target directory's files into category folders.
    ///
    /// With `dry_run` set nothing on disk changes: files are only classified
    /// and tallied per category, and the undo log of the previous live pass
    /// is kept. A live pass starts a fresh undo log.
    ///
    /// # Errors
    ///
    /// Only directory-level problems are returned: the target missing or not
    /// being a directory ([`OrganizeError::InvalidDirectory`]), or the target
    /// not being listable ([`OrganizeError::ScanFailed`]). Per-file failures
    /// are counted in the returned statistics instead.
    pub fn organize(
        &mut self,
        dry_run: bool,
        options: &OrganizeOptions,
    ) -> OrganizeResult<RunStatistics> {
        self.stats = RunStatistics::new(dry_run);
        self.check_target()?;

        let candidates = self.scan(options)?;
        tracing::debug!(
            target = %self.target.display(),
            candidates = candidates.len(),
            dry_run,
            "scan finished"
        );

        if !dry_run {
            self.undo_log.clear();
            self.emit(
                Severity::Info,
                format!("Started organizing files in {}", self.target.display()),
            );
        }

        if let Some(filter) = &options.category_filter {
            let unknown: Vec<String> = filter
                .categories()
                .filter(|name| !self.classifier.contains(name))
                .map(str::to_string)
                .collect();
            for name in unknown {
                self.emit(
                    Severity::Warning,
                    format!("Category filter names unknown category '{name}'"),
                );
            }
        }

        let layout = options.recursion.unwrap_or_default();
        for candidate in candidates {
            let category = self.classifier.classify(&candidate.name).to_string();

            if let Some(filter) = &options.category_filter
                && !filter.allows(&category)
            {
                self.skip(&candidate.relative, "category not selected");
                continue;
            }

            let destination = self.destination_for(&candidate, &category, layout);

            if dry_run {
                self.emit(
                    Severity::Debug,
                    format!(
                        "Would move {} to {}/",
                        candidate.relative.display(),
                        category
                    ),
                );
                self.tally(&category, &destination);
                continue;
            }

            match self.relocate(&candidate.path, &destination, &category) {
                Ok(record) => {
                    self.emit(
                        Severity::Info,
                        format!(
                            "Moved {} to {}",
                            record.source.display(),
                            record.destination.display()
                        ),
                    );
                    self.stats.moved += 1;
                    self.tally(&category, &record.destination);
                    self.undo_log.push(record);
                }
                Err(e) => {
                    self.stats.errors += 1;
                    self.emit(Severity::Error, e.to_string());
                }
            }
        }

        let summary = format!(
            "{} moved, {} skipped, {} errors, {} folders created",
            self.stats.moved, self.stats.skipped, self.stats.errors, self.stats.folders_created
        );
        if dry_run {
            self.emit(
                Severity::Debug,
                format!("Preview complete: {} files would move", self.stats.categorized()),
            );
        } else {
            self.emit(Severity::Info, format!("Organizing complete: {summary}"));
        }

        Ok(self.stats.clone())
    }

    pub(crate) fn emit(&mut self, severity: Severity, message: impl Into<String>) {
        self.sink.record(LogRecord::now(severity, message));
    }

    fn tally(&mut self, category: &str, destination: &Path) {
        let folder = self.target.join(category);
        let name = destination
            .strip_prefix(&folder)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| destination.file_name().map(PathBuf::from).unwrap_or_default());
        *self.stats.by_category.entry(category.to_string()).or_insert(0) += 1;
        self.stats
            .moved_files
            .entry(category.to_string())
            .or_default()
            .push(name);
    }

    fn skip(&mut self, relative: &Path, reason: &str) {
        self.stats.skipped += 1;
        self.emit(
            Severity::Debug,
            format!("Skipped {} ({})", relative.display(), reason),
        );
    }

    fn check_target(&mut self) -> OrganizeResult<()> {
        let reason = match fs::metadata(&self.target) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => "not a directory".to_string(),
            Err(e) => e.to_string(),
        };
        let err = OrganizeError::InvalidDirectory {
            path: self.target.clone(),
            reason,
        };
        self.emit(Severity::Error, err.to_string());
        Err(err)
    }

    /// Lists the files to consider, counting the ones left out.
    fn scan(&mut self, options: &OrganizeOptions) -> OrganizeResult<Vec<Candidate>> {
        let max_depth = if options.recursion.is_some() { usize::MAX } else { 1 };
        let category_dirs: HashSet<OsString> = self
            .classifier
            .categories()
            .into_iter()
            .map(OsString::from)
            .collect();
        let artifacts = self.sink.artifacts();

        let walker = WalkDir::new(&self.target)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden_dir(entry));

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let err = OrganizeError::ScanFailed {
                        path: self.target.clone(),
                        source: e.into(),
                    };
                    self.emit(Severity::Error, err.to_string());
                    return Err(err);
                }
                Err(e) => {
                    self.stats.errors += 1;
                    self.emit(Severity::Error, format!("Could not read entry: {e}"));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_path_buf();
            let relative = path
                .strip_prefix(&self.target)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            let name = entry.file_name().to_string_lossy().into_owned();

            if name == HISTORY_FILE_NAME || is_artifact(&path, &artifacts) {
                self.skip(&relative, "organizer artifact");
                continue;
            }
            if entry.depth() > 1
                && relative
                    .components()
                    .next()
                    .is_some_and(|top| category_dirs.contains(top.as_os_str()))
            {
                self.skip(&relative, "already organized");
                continue;
            }
            if name.starts_with('.') {
                self.skip(&relative, "hidden file");
                continue;
            }
            if !self.filters.should_include(&relative) {
                self.skip(&relative, "excluded by configuration");
                continue;
            }

            candidates.push(Candidate {
                path,
                relative,
                name,
            });
        }

        Ok(candidates)
    }

    fn destination_for(
        &self,
        candidate: &Candidate,
        category: &str,
        layout: RecursionMode,
    ) -> PathBuf {
        let mut folder = self.target.join(category);
        if layout == RecursionMode::Mirror
            && let Some(parent) = candidate.relative.parent()
            && !parent.as_os_str().is_empty()
        {
            folder.push(parent);
        }
        match candidate.path.file_name() {
            Some(file_name) => folder.join(file_name),
            None => folder.join(&candidate.name),
        }
    }

    /// Moves one file into place and returns what was done.
    fn relocate(
        &mut self,
        source: &Path,
        destination: &Path,
        category: &str,
    ) -> OrganizeResult<MoveRecord> {
        if let Some(folder) = destination.parent() {
            self.ensure_folder(folder)?;
        }

        let free = free_destination(destination);
        if free != destination {
            self.emit(
                Severity::Warning,
                format!(
                    "{} already exists, using {}",
                    destination.display(),
                    free.display()
                ),
            );
        }

        move_file(source, &free).map_err(|e| OrganizeError::MoveFailed {
            from: source.to_path_buf(),
            to: free.clone(),
            source: e,
        })?;

        Ok(MoveRecord {
            source: source.to_path_buf(),
            destination: free,
            category: category.to_string(),
        })
    }

    /// Creates `folder` and any missing parents inside the target.
    fn ensure_folder(&mut self, folder: &Path) -> OrganizeResult<()> {
        let mut missing = Vec::new();
        let mut current = folder;
        loop {
            match fs::metadata(current) {
                Ok(meta) if meta.is_dir() => break,
                Ok(_) => {
                    return Err(OrganizeError::FolderCreationFailed {
                        path: current.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::NotADirectory,
                            "path exists and is not a directory",
                        ),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    missing.push(current.to_path_buf());
                    match current.parent() {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                Err(e) => {
                    return Err(OrganizeError::FolderCreationFailed {
                        path: current.to_path_buf(),
                        source: e,
                    });
                }
            }
        }

        for folder in missing.into_iter().rev() {
            match fs::create_dir(&folder) {
                Ok(()) => {
                    self.stats.folders_created += 1;
                    self.emit(
                        Severity::Info,
                        format!("Created folder {}", folder.display()),
                    );
                    self.undo_log.record_folder(folder);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && folder.is_dir() => {}
                Err(e) => {
                    return Err(OrganizeError::FolderCreationFailed {
                        path: folder,
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Hidden directories are never descended into.
fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_artifact(path: &Path, artifacts: &[PathBuf]) -> bool {
    artifacts.iter().any(|artifact| {
        artifact.file_name() == path.file_name()
            && path.canonicalize().is_ok_and(|p| &p == artifact)
    })
}

/// True if anything, even a dangling symlink, sits at `path`.
pub(crate) fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Splits a file name at its last dot, keeping the dot with the extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

/// Returns `destination`, or a timestamped variant of it if it is taken.
///
/// `photo.png` becomes `photo_20251109_143052.png`; if that is taken as well
/// a counter is appended (`photo_20251109_143052_1.png`).
pub(crate) fn free_destination(destination: &Path) -> PathBuf {
    if !is_occupied(destination) {
        return destination.to_path_buf();
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&file_name);

    let mut candidate = destination.with_file_name(format!("{stem}_{stamp}{ext}"));
    let mut counter = 1;
    while is_occupied(&candidate) {
        candidate = destination.with_file_name(format!("{stem}_{stamp}_{counter}{ext}"));
        counter += 1;
    }
    candidate
}

/// Renames `from` to `to`, copying across filesystems when needed.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
