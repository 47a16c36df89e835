// logsieve - core/tree.rs
//
// File and directory nodes of the browsed log tree.
//
// A `FileNode` owns its ordered record sequence. A `DirectoryNode` owns its
// child files and sub-directories; its visibility is derived bottom-up from
// its descendants by `update_visibility` and is never set directly.

use crate::core::model::{LoadState, LogRecord};
use crate::core::observable::ObservableList;
use crate::util::constants;
use crate::util::error::LoadError;
use chrono::NaiveDate;
use parking_lot::{Mutex, MutexGuard, RwLock};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

// =============================================================================
// File naming
// =============================================================================

/// Result of matching a filename against the unify-named convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyName {
    /// The name does not follow the convention.
    NotUnified,
    /// The name follows the convention. `date` is `None` when the embedded
    /// date is not a real calendar date (e.g. month 13).
    Unified { date: Option<NaiveDate> },
}

/// Classify a file name (base name only) against the unify-named pattern.
pub fn classify_file_name(file_name: &str) -> UnifyName {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(constants::UNIFY_NAME_PATTERN).expect("unify name pattern: invalid regex")
    });

    let Some(caps) = pattern.captures(file_name) else {
        return UnifyName::NotUnified;
    };

    let raw_date = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let date = match NaiveDate::parse_from_str(raw_date, constants::UNIFY_DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::debug!(
                file = file_name,
                date = raw_date,
                error = %e,
                "Unify-named file carries an invalid date"
            );
            None
        }
    };
    UnifyName::Unified { date }
}

// =============================================================================
// FileNode
// =============================================================================

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a file node for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One log file in the tree together with its parsed records.
pub struct FileNode {
    id: FileId,
    path: PathBuf,
    display_name: String,
    is_unify_named: bool,
    file_date: Option<NaiveDate>,
    is_selected: AtomicBool,
    is_expanded: AtomicBool,
    is_visible: AtomicBool,
    records: ObservableList<Arc<LogRecord>>,
    load_state: RwLock<LoadState>,
    /// Held for the whole duration of a load so loads of one file queue up.
    load_lock: Mutex<()>,
}

impl FileNode {
    /// Build a node for `path`, deriving the display name and (for
    /// unify-named files) the file date from the base name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(LoadError::EmptyPath);
        }

        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let (is_unify_named, file_date) = match classify_file_name(&display_name) {
            UnifyName::NotUnified => (false, None),
            UnifyName::Unified { date } => (true, date),
        };

        Ok(Self {
            id: FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed)),
            path: path.to_path_buf(),
            display_name,
            is_unify_named,
            file_date,
            is_selected: AtomicBool::new(false),
            is_expanded: AtomicBool::new(false),
            is_visible: AtomicBool::new(true),
            records: ObservableList::new(),
            load_state: RwLock::new(LoadState::Unloaded),
            load_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_unify_named(&self) -> bool {
        self.is_unify_named
    }

    pub fn file_date(&self) -> Option<NaiveDate> {
        self.file_date
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected.load(Ordering::SeqCst)
    }

    pub fn set_selected(&self, selected: bool) {
        self.is_selected.store(selected, Ordering::SeqCst);
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded.load(Ordering::SeqCst)
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.is_expanded.store(expanded, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible.load(Ordering::SeqCst)
    }

    pub fn set_visible(&self, visible: bool) {
        self.is_visible.store(visible, Ordering::SeqCst);
    }

    /// The file's records in source order.
    pub fn records(&self) -> &ObservableList<Arc<LogRecord>> {
        &self.records
    }

    /// Replace all records as one batched mutation.
    pub fn replace_records(&self, records: Vec<Arc<LogRecord>>) {
        let _scope = self.records.suspend_notifications();
        self.records.replace_range(records);
    }

    pub fn load_state(&self) -> LoadState {
        *self.load_state.read()
    }

    pub fn set_load_state(&self, state: LoadState) {
        *self.load_state.write() = state;
    }

    /// Serialise loads of this file. The guard must be held for the whole
    /// read-parse-publish sequence.
    pub fn lock_for_load(&self) -> MutexGuard<'_, ()> {
        self.load_lock.lock()
    }
}

impl std::fmt::Debug for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNode")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("file_date", &self.file_date)
            .field("records", &self.records.len())
            .finish()
    }
}

impl std::fmt::Display for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

// =============================================================================
// DirectoryNode
// =============================================================================

/// A directory in the browsed tree.
#[derive(Debug)]
pub struct DirectoryNode {
    path: PathBuf,
    name: String,
    files: RwLock<Vec<Arc<FileNode>>>,
    directories: RwLock<Vec<Arc<DirectoryNode>>>,
    is_visible: AtomicBool,
}

impl DirectoryNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            files: RwLock::new(Vec::new()),
            directories: RwLock::new(Vec::new()),
            is_visible: AtomicBool::new(true),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_file(&self, file: Arc<FileNode>) {
        self.files.write().push(file);
    }

    pub fn add_directory(&self, directory: Arc<DirectoryNode>) {
        self.directories.write().push(directory);
    }

    /// Direct child files in insertion order.
    pub fn files(&self) -> Vec<Arc<FileNode>> {
        self.files.read().clone()
    }

    /// Direct sub-directories in insertion order.
    pub fn directories(&self) -> Vec<Arc<DirectoryNode>> {
        self.directories.read().clone()
    }

    /// Detach a file anywhere below this directory.
    pub fn remove_file(&self, id: FileId) -> Option<Arc<FileNode>> {
        {
            let mut files = self.files.write();
            if let Some(pos) = files.iter().position(|f| f.id() == id) {
                return Some(files.remove(pos));
            }
        }
        self.directories
            .read()
            .iter()
            .find_map(|d| d.remove_file(id))
    }

    /// Every file below this directory, depth-first, files before
    /// sub-directories at each level.
    pub fn all_nested_files(&self) -> Vec<Arc<FileNode>> {
        let mut out = self.files();
        for dir in self.directories.read().iter() {
            out.extend(dir.all_nested_files());
        }
        out
    }

    /// Find a file below this directory by path.
    pub fn find_file(&self, path: &Path) -> Option<Arc<FileNode>> {
        if let Some(f) = self.files.read().iter().find(|f| f.path() == path) {
            return Some(Arc::clone(f));
        }
        self.directories
            .read()
            .iter()
            .find_map(|d| d.find_file(path))
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible.load(Ordering::SeqCst)
    }

    /// Recompute visibility from the leaves up: a directory is visible iff
    /// at least one file below it is visible. Every sub-directory is
    /// recomputed, even once the answer for this one is known.
    pub fn update_visibility(&self) -> bool {
        let mut visible = false;
        for dir in self.directories.read().iter() {
            visible |= dir.update_visibility();
        }
        visible |= self.files.read().iter().any(|f| f.is_visible());
        self.is_visible.store(visible, Ordering::SeqCst);
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Arc<FileNode> {
        Arc::new(FileNode::from_path(name).unwrap())
    }

    #[test]
    fn test_unify_named_file_gets_date() {
        let node = FileNode::from_path("/logs/app_2024-03-10_000001_1.log").unwrap();
        assert!(node.is_unify_named());
        assert_eq!(node.file_date(), NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(node.display_name(), "app_2024-03-10_000001_1.log");
    }

    #[test]
    fn test_dotted_prefix_is_unify_named() {
        let node = FileNode::from_path("Orc.LogViewer_2015-01-20_094512_4321.log").unwrap();
        assert_eq!(node.file_date(), NaiveDate::from_ymd_opt(2015, 1, 20));
    }

    #[test]
    fn test_non_matching_name_has_no_date() {
        for name in [
            "random.log",
            "app_2024-03-10_00001_1.log",
            "app-2024-03-10_000001_1.log",
            "app_2024-03-10_000001_1.txt",
            "app1_2024-03-10_000001_1.log",
        ] {
            let node = FileNode::from_path(name).unwrap();
            assert!(!node.is_unify_named(), "{name} should not be unify-named");
            assert_eq!(node.file_date(), None);
            assert_eq!(node.display_name(), name);
        }
    }

    #[test]
    fn test_invalid_embedded_date_is_soft() {
        let node = FileNode::from_path("app_2024-13-45_000001_1.log").unwrap();
        assert!(node.is_unify_named());
        assert_eq!(node.file_date(), None);
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(
            FileNode::from_path(""),
            Err(LoadError::EmptyPath)
        ));
    }

    #[test]
    fn test_directory_visible_iff_descendant_visible() {
        let root = DirectoryNode::new("/root");
        let sub = Arc::new(DirectoryNode::new("/root/sub"));
        let deep = Arc::new(DirectoryNode::new("/root/sub/deep"));
        let empty = Arc::new(DirectoryNode::new("/root/empty"));
        let a = file("/root/sub/deep/a.log");
        let b = file("/root/b.log");
        deep.add_file(Arc::clone(&a));
        sub.add_directory(Arc::clone(&deep));
        root.add_directory(Arc::clone(&sub));
        root.add_directory(Arc::clone(&empty));
        root.add_file(Arc::clone(&b));

        a.set_visible(true);
        b.set_visible(false);
        assert!(root.update_visibility());
        assert!(sub.is_visible());
        assert!(deep.is_visible());
        assert!(!empty.is_visible());

        a.set_visible(false);
        assert!(!root.update_visibility());
        assert!(!sub.is_visible());
        assert!(!deep.is_visible());

        b.set_visible(true);
        assert!(root.update_visibility());
        assert!(!sub.is_visible());
    }

    #[test]
    fn test_nested_files_and_removal() {
        let root = DirectoryNode::new("/r");
        let sub = Arc::new(DirectoryNode::new("/r/s"));
        let a = file("/r/a.log");
        let b = file("/r/s/b.log");
        root.add_file(Arc::clone(&a));
        sub.add_file(Arc::clone(&b));
        root.add_directory(sub);

        let all: Vec<_> = root.all_nested_files().iter().map(|f| f.id()).collect();
        assert_eq!(all, vec![a.id(), b.id()]);
        assert!(root.find_file(Path::new("/r/s/b.log")).is_some());

        let removed = root.remove_file(b.id()).unwrap();
        assert_eq!(removed.id(), b.id());
        assert_eq!(root.all_nested_files().len(), 1);
        assert!(root.remove_file(b.id()).is_none());
    }

    #[test]
    fn test_replace_records_is_one_notification() {
        use crate::core::model::EventKind;
        use std::sync::atomic::AtomicUsize;

        let node = file("batch.log");
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        node.records().subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let records = (0..500)
            .map(|i| {
                Arc::new(LogRecord::new(
                    &node,
                    i,
                    chrono::Utc::now(),
                    EventKind::Info,
                    "m",
                ))
            })
            .collect();
        node.replace_records(records);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(node.records().len(), 500);
    }
}
