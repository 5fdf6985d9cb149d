/// Integration tests for tidyup
///
/// These tests drive the library the way the binary does: an engine over a
/// real temporary directory, or the `execute` entry point with a loaded
/// configuration and the on-disk undo history.
///
/// Test categories:
/// 1. Basic organization workflows
/// 2. Dry-run mode verification
/// 3. Undo and conflict resolution
/// 4. Configuration and filtering
/// 5. Recursive passes
/// 6. Edge cases and error scenarios
use clap::Parser;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tidyup::cli::{Cli, CommandReport, OrganizeCommand, execute, run_cli};
use tidyup::config::Config;
use tidyup::events::{LogFileSink, MemorySink, NullSink, Severity};
use tidyup::file_category::CategoryTable;
use tidyup::file_organizer::{
    CategoryFilter, OrganizeError, OrganizeOptions, Organizer, RecursionMode, RunStatistics,
};
use tidyup::undo::{HISTORY_FILE_NAME, UndoOutcome};
use walkdir::WalkDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture that sets up a temporary directory with configurable
/// file structure for testing.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new test fixture with a temporary directory.
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    /// Get the path to the test directory.
    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content, creating parent folders as needed.
    fn create_file(&self, rel_path: &str, content: &str) {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content.as_bytes())
            .expect("Failed to write file content");
    }

    /// Create multiple files, each containing its own name.
    fn create_files(&self, names: &[&str]) {
        for name in names {
            self.create_file(name, name);
        }
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }

    /// Assert that a file exists at the given relative path.
    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    /// Assert that nothing exists at the given relative path.
    fn assert_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    /// Count the entries of a folder (non-recursive).
    fn count_entries(&self, rel_path: &str) -> usize {
        fs::read_dir(self.path().join(rel_path))
            .expect("Failed to read directory")
            .count()
    }

    /// Every file under the fixture with its content, keyed by relative path.
    fn snapshot(&self) -> BTreeMap<PathBuf, String> {
        WalkDir::new(self.path())
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry
                    .path()
                    .strip_prefix(self.path())
                    .expect("entry is under the fixture")
                    .to_path_buf();
                let content = fs::read_to_string(entry.path()).unwrap_or_default();
                (relative, content)
            })
            .collect()
    }

    fn organizer(&self) -> Organizer<MemorySink> {
        Organizer::with_sink(self.path(), CategoryTable::default(), MemorySink::new())
    }

    fn run(&self, command: OrganizeCommand, config: &Config) -> CommandReport {
        execute(
            command,
            self.path(),
            config,
            &OrganizeOptions::default(),
            NullSink,
        )
        .expect("command should succeed")
    }
}

fn organized(report: CommandReport) -> RunStatistics {
    match report {
        CommandReport::Organized(stats) => stats,
        other => panic!("expected organize statistics, got {other:?}"),
    }
}

fn undone(report: CommandReport) -> UndoOutcome {
    match report {
        CommandReport::Undone(outcome) => outcome,
        other => panic!("expected undo outcome, got {other:?}"),
    }
}

const LIVE: OrganizeCommand = OrganizeCommand::Organize { dry_run: false };
const DRY: OrganizeCommand = OrganizeCommand::Organize { dry_run: true };

// ============================================================================
// 1. Basic organization workflows
// ============================================================================

#[test]
fn test_organize_mixed_file_types() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "photo.png", "archive.zip", "unknown.xyz"]);

    let mut organizer = fixture.organizer();
    let stats = organizer
        .organize(false, &OrganizeOptions::default())
        .expect("organize should succeed");

    assert_eq!(stats.moved, 4);
    assert_eq!(stats.folders_created, 4);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.skipped, 0);
    for category in ["Documents", "Images", "Archives", "Others"] {
        assert_eq!(stats.by_category.get(category), Some(&1), "{category}");
    }

    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_file_exists("Images/photo.png");
    fixture.assert_file_exists("Archives/archive.zip");
    fixture.assert_file_exists("Others/unknown.xyz");
    assert_eq!(fixture.read("Documents/report.pdf"), "report.pdf");

    let moved_records = organizer
        .sink()
        .at_least(Severity::Info)
        .filter(|r| r.message.starts_with("Moved "))
        .count();
    assert_eq!(moved_records, 4);
    assert!(organizer.can_undo());
}

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let stats = organized(fixture.run(LIVE, &Config::default()));

    assert_eq!(stats, RunStatistics::default());
    assert_eq!(fixture.count_entries("."), 0);
    fixture.assert_not_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_organize_mixed_case_and_multi_dot_names() {
    let fixture = TestFixture::new();
    fixture.create_files(&["Scan.PDF", "backup.tar.gz", "Makefile", "notes.final.TXT"]);

    organized(fixture.run(LIVE, &Config::default()));

    fixture.assert_file_exists("Documents/Scan.PDF");
    fixture.assert_file_exists("Archives/backup.tar.gz");
    fixture.assert_file_exists("Others/Makefile");
    fixture.assert_file_exists("Documents/notes.final.TXT");
}

#[test]
fn test_organize_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.txt", "b.png"]);

    let mut organizer = fixture.organizer();
    let options = OrganizeOptions::default();
    let first = organizer.organize(false, &options).unwrap();
    assert_eq!(first.moved, 2);

    let before = fixture.snapshot();
    let second = organizer.organize(false, &options).unwrap();
    assert_eq!(second.moved, 0);
    assert_eq!(second.folders_created, 0);
    assert_eq!(fixture.snapshot(), before);
}

#[test]
fn test_collision_keeps_both_files() {
    let fixture = TestFixture::new();
    fixture.create_file("Documents/report.pdf", "already sorted");
    fixture.create_file("report.pdf", "new download");

    let stats = organized(fixture.run(LIVE, &Config::default()));

    assert_eq!(stats.moved, 1);
    assert_eq!(stats.folders_created, 0);
    assert_eq!(fixture.count_entries("Documents"), 2);
    assert_eq!(fixture.read("Documents/report.pdf"), "already sorted");

    let renamed: Vec<String> = fs::read_dir(fixture.path().join("Documents"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != "report.pdf")
        .collect();
    assert_eq!(renamed.len(), 1);
    assert!(renamed[0].starts_with("report_"), "got {}", renamed[0]);
    assert!(renamed[0].ends_with(".pdf"), "got {}", renamed[0]);
    assert_eq!(
        fixture.read(&format!("Documents/{}", renamed[0])),
        "new download"
    );
}

#[test]
fn test_hidden_files_stay_in_place() {
    let fixture = TestFixture::new();
    fixture.create_files(&[".env", "visible.txt"]);

    let stats = organized(fixture.run(LIVE, &Config::default()));

    assert_eq!(stats.moved, 1);
    assert_eq!(stats.skipped, 1);
    fixture.assert_file_exists(".env");
    fixture.assert_file_exists("Documents/visible.txt");
}

// ============================================================================
// 2. Dry-run mode verification
// ============================================================================

#[test]
fn test_dry_run_leaves_tree_unchanged() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "photo.png", "archive.zip", "unknown.xyz"]);
    let before = fixture.snapshot();

    let stats = organized(fixture.run(DRY, &Config::default()));

    assert!(stats.dry_run);
    assert_eq!(stats.moved, 0);
    assert_eq!(stats.folders_created, 0);
    assert_eq!(stats.categorized(), 4);
    assert_eq!(stats.by_category.get("Images"), Some(&1));
    assert_eq!(fixture.snapshot(), before);
    assert_eq!(fixture.count_entries("."), 4);
}

#[test]
fn test_dry_run_matches_live_run() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.pdf", "b.pdf", "c.mp3", "d.rs"]);

    let mut organizer = fixture.organizer();
    let preview = organizer
        .preview(&OrganizeOptions::default())
        .expect("preview should succeed");
    let live = organizer
        .organize(false, &OrganizeOptions::default())
        .expect("organize should succeed");

    assert_eq!(preview.by_category, live.by_category);
    assert_eq!(live.moved, preview.categorized());
}

#[test]
fn test_dry_run_does_not_create_log_file() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf"]);
    let before = fixture.snapshot();
    let log_path = fixture.path().join("tidyup.log");

    let args: Vec<OsString> = vec![
        "tidyup".into(),
        fixture.path().into(),
        "--dry-run".into(),
        "--json".into(),
        "--only".into(),
        "Fonts".into(),
        "--log-file".into(),
        log_path.into(),
    ];
    let cli = Cli::parse_from(args);
    let stats = organized(run_cli(&cli).expect("dry run should succeed"));

    assert!(stats.dry_run);
    assert_eq!(stats.skipped, 1);
    fixture.assert_not_exists("tidyup.log");
    assert_eq!(fixture.snapshot(), before);
}

// ============================================================================
// 3. Undo and conflict resolution
// ============================================================================

#[test]
fn test_undo_restores_original_layout() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "photo.png", "archive.zip", "unknown.xyz"]);
    let before = fixture.snapshot();

    let mut organizer = fixture.organizer();
    organizer
        .organize(false, &OrganizeOptions::default())
        .expect("organize should succeed");

    let outcome = organizer.undo();
    let report = outcome.report().expect("undo should run");
    assert_eq!(report.restored_files, 4);
    assert_eq!(report.removed_folders, 4);
    assert!(report.is_complete_success());

    assert_eq!(fixture.snapshot(), before);
    assert_eq!(fixture.count_entries("."), 4);

    assert!(matches!(organizer.undo(), UndoOutcome::NothingToUndo));
}

#[test]
fn test_undo_without_prior_run() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf"]);

    let outcome = undone(fixture.run(OrganizeCommand::Undo, &Config::default()));

    assert!(matches!(outcome, UndoOutcome::NothingToUndo));
    fixture.assert_file_exists("report.pdf");
}

#[test]
fn test_undo_across_invocations_uses_history_file() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "song.mp3"]);
    let before = fixture.snapshot();

    let stats = organized(fixture.run(LIVE, &Config::default()));
    assert_eq!(stats.moved, 2);
    fixture.assert_file_exists(HISTORY_FILE_NAME);

    let outcome = undone(fixture.run(OrganizeCommand::Undo, &Config::default()));
    let report = outcome.report().expect("history should be found");
    assert_eq!(report.restored_files, 2);

    fixture.assert_not_exists(HISTORY_FILE_NAME);
    fixture.assert_not_exists("Documents");
    fixture.assert_not_exists("Audio");
    assert_eq!(fixture.snapshot(), before);

    let again = undone(fixture.run(OrganizeCommand::Undo, &Config::default()));
    assert!(matches!(again, UndoOutcome::NothingToUndo));
}

#[test]
fn test_undo_backs_up_file_in_the_way() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", "original");

    organized(fixture.run(LIVE, &Config::default()));
    fixture.create_file("report.pdf", "newer copy");

    let outcome = undone(fixture.run(OrganizeCommand::Undo, &Config::default()));
    let report = outcome.report().expect("undo should run");

    assert_eq!(report.restored_files, 1);
    assert_eq!(report.backed_up.len(), 1);
    assert_eq!(fixture.read("report.pdf"), "original");

    let backup = &report.backed_up[0];
    let backup_name = backup.file_name().unwrap().to_string_lossy();
    assert!(backup_name.starts_with("report.pdf.bak."), "got {backup_name}");
    assert_eq!(fs::read_to_string(backup).unwrap(), "newer copy");
}

#[test]
fn test_undo_reports_missing_file_and_continues() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.txt", "b.txt"]);

    let mut organizer = fixture.organizer();
    organizer
        .organize(false, &OrganizeOptions::default())
        .expect("organize should succeed");
    fs::remove_file(fixture.path().join("Documents/a.txt")).unwrap();

    let outcome = organizer.undo();
    let report = outcome.report().expect("undo should run");

    assert_eq!(report.restored_files, 1);
    assert_eq!(report.failed_restores.len(), 1);
    assert!(!report.is_complete_success());
    fixture.assert_file_exists("b.txt");
    assert!(!organizer.can_undo());
}

// ============================================================================
// 4. Configuration and filtering
// ============================================================================

#[test]
fn test_custom_category_table_from_config() {
    let fixture = TestFixture::new();
    fixture.create_files(&["novel.epub", "photo.png", "paper.pdf"]);

    let config = Config::from_toml_str(
        r#"
[[categories]]
name = "Books"
extensions = ["epub", ".pdf"]

[[categories]]
name = "Papers"
extensions = [".pdf"]
"#,
    )
    .expect("config should parse");

    let stats = organized(fixture.run(LIVE, &config));

    assert_eq!(stats.moved, 3);
    fixture.assert_file_exists("Books/novel.epub");
    // First-listed category wins the shared extension.
    fixture.assert_file_exists("Books/paper.pdf");
    fixture.assert_file_exists("Others/photo.png");
    fixture.assert_not_exists("Papers");
}

#[test]
fn test_exclusion_rules_from_config() {
    let fixture = TestFixture::new();
    fixture.create_files(&["download.tmp", "keep.tmp", "Thumbs.db", "movie.mkv.part", "doc.txt"]);

    let config = Config::from_toml_str(
        r#"
[filters.exclude]
filenames = ["Thumbs.db"]
extensions = ["tmp"]
patterns = ["*.part"]

[filters.include]
patterns = ["keep.tmp"]
"#,
    )
    .expect("config should parse");

    let stats = organized(fixture.run(LIVE, &config));

    assert_eq!(stats.moved, 2);
    assert_eq!(stats.skipped, 3);
    fixture.assert_file_exists("download.tmp");
    fixture.assert_file_exists("Thumbs.db");
    fixture.assert_file_exists("movie.mkv.part");
    fixture.assert_file_exists("Others/keep.tmp");
    fixture.assert_file_exists("Documents/doc.txt");
}

#[test]
fn test_category_filter_only_moves_selected() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf", "photo.png", "song.mp3"]);

    let options = OrganizeOptions {
        category_filter: Some(CategoryFilter::new(["Images", "Podcasts"])),
        ..Default::default()
    };
    let mut organizer = fixture.organizer();
    let stats = organizer
        .organize(false, &options)
        .expect("organize should succeed");

    assert_eq!(stats.moved, 1);
    assert_eq!(stats.skipped, 2);
    fixture.assert_file_exists("Images/photo.png");
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("song.mp3");

    let warned = organizer
        .sink()
        .at_least(Severity::Warning)
        .any(|r| r.message.contains("Podcasts"));
    assert!(warned, "unknown filter category should be reported");
}

#[test]
fn test_log_file_is_written_and_not_organized() {
    let fixture = TestFixture::new();
    fixture.create_files(&["report.pdf"]);
    let log_path = fixture.path().join("tidyup.log");
    let log = LogFileSink::open(&log_path).expect("Failed to open log");

    let report = execute(
        LIVE,
        fixture.path(),
        &Config::default(),
        &OrganizeOptions::default(),
        (NullSink, log),
    )
    .expect("organize should succeed");
    let stats = organized(report);

    assert_eq!(stats.moved, 1);
    fixture.assert_file_exists("tidyup.log");
    fixture.assert_not_exists("Others");

    let content = fixture.read("tidyup.log");
    assert!(content.lines().any(|l| l.contains(" - INFO - Moved ")));
    assert!(content.lines().any(|l| l.contains(" - INFO - Organizing complete")));
}

// ============================================================================
// 5. Recursive passes
// ============================================================================

#[test]
fn test_recursive_flatten() {
    let fixture = TestFixture::new();
    fixture.create_files(&["top.pdf", "sub/inner.txt", "sub/deeper/song.mp3", ".git/config.txt"]);

    let options = OrganizeOptions {
        recursion: Some(RecursionMode::Flatten),
        ..Default::default()
    };
    let stats = fixture
        .organizer()
        .organize(false, &options)
        .expect("organize should succeed");

    assert_eq!(stats.moved, 3);
    fixture.assert_file_exists("Documents/top.pdf");
    fixture.assert_file_exists("Documents/inner.txt");
    fixture.assert_file_exists("Audio/song.mp3");
    fixture.assert_file_exists(".git/config.txt");
}

#[test]
fn test_recursive_mirror_and_undo() {
    let fixture = TestFixture::new();
    fixture.create_files(&["top.pdf", "sub/inner.txt"]);
    let before = fixture.snapshot();

    let options = OrganizeOptions {
        recursion: Some(RecursionMode::Mirror),
        ..Default::default()
    };
    let mut organizer = fixture.organizer();
    let stats = organizer
        .organize(false, &options)
        .expect("organize should succeed");

    assert_eq!(stats.moved, 2);
    assert_eq!(stats.folders_created, 2);
    fixture.assert_file_exists("Documents/top.pdf");
    fixture.assert_file_exists("Documents/sub/inner.txt");

    let outcome = organizer.undo();
    assert_eq!(outcome.report().map(|r| r.restored_files), Some(2));
    assert_eq!(fixture.snapshot(), before);
    fixture.assert_not_exists("Documents");
}

#[test]
fn test_recursive_config_layout_through_cli() {
    let fixture = TestFixture::new();
    fixture.create_files(&["photos/cat.png"]);

    let config = Config::from_toml_str(r#"recursion = "mirror""#).expect("config should parse");
    let options = OrganizeOptions {
        recursion: Some(config.recursion),
        ..Default::default()
    };
    let report = execute(LIVE, fixture.path(), &config, &options, NullSink)
        .expect("organize should succeed");

    let stats = organized(report);
    assert_eq!(stats.moved, 1);
    assert_eq!(
        stats.moved_files.get("Images"),
        Some(&vec![PathBuf::from("photos/cat.png")])
    );
    fixture.assert_file_exists("Images/photos/cat.png");
}

#[test]
fn test_recursive_rerun_counts_sorted_files_as_skipped() {
    let fixture = TestFixture::new();
    fixture.create_files(&["top.pdf", "sub/song.mp3"]);

    let options = OrganizeOptions {
        recursion: Some(RecursionMode::Flatten),
        ..Default::default()
    };
    let mut organizer = fixture.organizer();
    let first = organizer
        .organize(false, &options)
        .expect("organize should succeed");
    assert_eq!(first.moved, 2);

    let before = fixture.snapshot();
    let second = organizer
        .organize(false, &options)
        .expect("organize should succeed");

    assert_eq!(second.moved, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(fixture.snapshot(), before);
}

// ============================================================================
// 6. Edge cases and error scenarios
// ============================================================================

#[test]
fn test_missing_directory_is_an_error() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("nope");

    let mut organizer =
        Organizer::with_sink(&missing, CategoryTable::default(), MemorySink::new());
    let result = organizer.organize(false, &OrganizeOptions::default());

    assert!(matches!(result, Err(OrganizeError::InvalidDirectory { .. })));
    assert!(organizer.sink().at_least(Severity::Error).count() >= 1);
}

#[test]
fn test_per_file_failure_does_not_abort_run() {
    let fixture = TestFixture::new();
    // A plain file where the Documents folder should go.
    fixture.create_file("Documents", "not a folder");
    fixture.create_files(&["report.pdf", "photo.png"]);

    let options = OrganizeOptions {
        category_filter: Some(CategoryFilter::new(["Documents", "Images"])),
        ..Default::default()
    };
    let mut organizer = fixture.organizer();
    let stats = organizer
        .organize(false, &options)
        .expect("run should complete");

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.moved, 1);
    assert_eq!(stats.skipped, 1);
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("Images/photo.png");
    assert!(organizer.sink().at_least(Severity::Error).count() >= 1);
}
