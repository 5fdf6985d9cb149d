/// Extension based file classification.
///
/// This module maps a file name to the name of the category folder it belongs
/// in. The mapping comes from a [`CategoryTable`], an ordered list of named
/// extension sets that is built once and never modified. Anything the table
/// does not know about lands in the [`OTHERS`] category.
///
/// # Examples
///
/// ```
/// use tidyup::file_category::{Classifier, CategoryTable};
///
/// let classifier = Classifier::new(CategoryTable::default());
/// assert_eq!(classifier.classify("report.PDF"), "Documents");
/// assert_eq!(classifier.classify("photo.png"), "Images");
/// assert_eq!(classifier.classify("notes.xyz"), "Others");
/// ```
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Catch-all category for extensions missing from the table.
pub const OTHERS: &str = "Others";

/// Categories shipped with the tool, in lookup order.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Documents",
        &[
            ".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".pages", ".xls", ".xlsx", ".csv",
            ".ppt", ".pptx", ".odp",
        ],
    ),
    (
        "Images",
        &[
            ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg", ".webp", ".ico", ".raw",
            ".heic", ".avif",
        ],
    ),
    (
        "Videos",
        &[
            ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv", ".m4v", ".3gp", ".mpg",
            ".mpeg",
        ],
    ),
    (
        "Audio",
        &[
            ".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a", ".opus", ".aiff",
        ],
    ),
    ("Archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"]),
    (
        "Code",
        &[
            ".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".php", ".rb", ".go", ".rs",
            ".ts", ".jsx", ".vue",
        ],
    ),
];

/// Errors raised while building a [`CategoryTable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    /// A category was given an empty name.
    #[error("category name must not be empty")]
    EmptyName,
    /// The name cannot be used as a single folder name.
    #[error("category name '{0}' is not a valid folder name")]
    InvalidName(String),
    /// The same category appears twice in the table.
    #[error("category '{0}' is listed more than once")]
    DuplicateName(String),
}

/// A named set of file extensions sharing a destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    extensions: BTreeSet<String>,
}

impl Category {
    /// The category name, which is also its folder name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase extensions, each with its leading dot.
    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }
}

/// Ordered mapping from category name to extension set.
///
/// When two categories list the same extension the first one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    /// Builds a table from `(name, extensions)` pairs.
    ///
    /// Extensions are lowercased and given a leading dot when it is missing,
    /// so `"PDF"`, `"pdf"` and `".pdf"` are the same entry.
    ///
    /// # Errors
    ///
    /// Returns a [`CategoryError`] if a name is empty, is not usable as a
    /// folder name, or appears twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidyup::file_category::CategoryTable;
    ///
    /// let table = CategoryTable::new([
    ///     ("Books", vec!["epub", ".MOBI"]),
    ///     ("Comics", vec![".cbz"]),
    /// ]).unwrap();
    /// assert_eq!(table.len(), 2);
    /// assert!(table.get("Books").unwrap().extensions().contains(".mobi"));
    /// ```
    pub fn new<I, N, E, X>(entries: I) -> Result<Self, CategoryError>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: IntoIterator<Item = X>,
        X: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for (name, extensions) in entries {
            let name = name.into().trim().to_string();
            validate_name(&name)?;
            if !seen.insert(name.clone()) {
                return Err(CategoryError::DuplicateName(name));
            }

            let extensions = extensions
                .into_iter()
                .filter_map(|ext| normalize_extension(ext.as_ref()))
                .collect();
            categories.push(Category { name, extensions });
        }

        Ok(Self { categories })
    }

    /// Iterates over the categories in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Looks up a category by name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, extensions)| Category {
                name: (*name).to_string(),
                extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
            })
            .collect();
        Self { categories }
    }
}

fn validate_name(name: &str) -> Result<(), CategoryError> {
    if name.is_empty() {
        return Err(CategoryError::EmptyName);
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(CategoryError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Lowercases an extension and makes sure it starts with a dot.
fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext == "." {
        return None;
    }
    if ext.starts_with('.') {
        Some(ext)
    } else {
        Some(format!(".{ext}"))
    }
}

/// Returns the lowercase extension of a file name, dot included.
///
/// Only the final path component is looked at. The extension starts at the
/// last `.`; a name without any dot has the empty extension.
///
/// # Examples
///
/// ```
/// use tidyup::file_category::extension_of;
///
/// assert_eq!(extension_of("Report.PDF"), ".pdf");
/// assert_eq!(extension_of("backup.tar.gz"), ".gz");
/// assert_eq!(extension_of("Makefile"), "");
/// ```
pub fn extension_of(file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);

    match name.rfind('.') {
        Some(idx) => name[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Maps file names to category names.
///
/// Holds the table it was built from and a flattened extension index.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: CategoryTable,
    // extension -> position in `table`
    index: HashMap<String, usize>,
}

impl Classifier {
    pub fn new(table: CategoryTable) -> Self {
        let mut index = HashMap::new();
        for (position, category) in table.categories.iter().enumerate() {
            for ext in &category.extensions {
                // First-listed category keeps the extension.
                index.entry(ext.clone()).or_insert(position);
            }
        }
        Self { table, index }
    }

    /// Returns the category a file name belongs to.
    ///
    /// Never fails: unknown or missing extensions map to [`OTHERS`].
    pub fn classify(&self, file_name: &str) -> &str {
        self.index
            .get(&extension_of(file_name))
            .map(|&position| self.table.categories[position].name.as_str())
            .unwrap_or(OTHERS)
    }

    /// All category names in table order, with [`OTHERS`] last.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .table
            .iter()
            .map(Category::name)
            .filter(|name| *name != OTHERS)
            .collect();
        names.push(OTHERS);
        names
    }

    /// True if `name` is a category this classifier can return.
    pub fn contains(&self, name: &str) -> bool {
        name == OTHERS || self.table.get(name).is_some()
    }

    /// Extensions routed to `name`, if it is in the table.
    pub fn extensions_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.table.get(name).map(Category::extensions)
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}
