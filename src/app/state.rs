// logsieve - app/state.rs
//
// Presentation-owned state read by the filter engine: the browsed roots,
// the file selection, and the displayed record table.

use crate::core::model::LogRecord;
use crate::core::observable::ObservableList;
use crate::core::tree::{DirectoryNode, FileId, FileNode};
use parking_lot::RwLock;
use std::sync::Arc;

/// Selection and tree roots as seen by the filter engine.
pub trait FileBrowser: Send + Sync {
    /// Currently selected files, in selection order.
    fn selected_files(&self) -> Vec<Arc<FileNode>>;

    /// Replace the selection. Must run on the presentation context.
    fn replace_selection(&self, files: Vec<Arc<FileNode>>);

    /// Root directories of the browsed tree.
    fn root_directories(&self) -> Vec<Arc<DirectoryNode>>;
}

/// Default [`FileBrowser`]: observable selection plus a list of roots.
#[derive(Debug, Default)]
pub struct FileBrowserModel {
    roots: RwLock<Vec<Arc<DirectoryNode>>>,
    selection: ObservableList<Arc<FileNode>>,
}

impl FileBrowserModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&self, root: Arc<DirectoryNode>) {
        self.roots.write().push(root);
    }

    /// Observable selection, for views to bind to.
    pub fn selection(&self) -> &ObservableList<Arc<FileNode>> {
        &self.selection
    }

    /// Add `file` to the selection if it is not already selected.
    pub fn select(&self, file: &Arc<FileNode>) {
        let already = self
            .selection
            .with_items(|items| items.iter().any(|f| f.id() == file.id()));
        if !already {
            file.set_selected(true);
            self.selection.push(Arc::clone(file));
        }
    }

    /// Remove the file from the selection.
    pub fn deselect(&self, id: FileId) {
        let remaining: Vec<_> = self
            .selection
            .snapshot()
            .into_iter()
            .filter(|f| {
                if f.id() == id {
                    f.set_selected(false);
                    false
                } else {
                    true
                }
            })
            .collect();
        self.replace_selection(remaining);
    }
}

impl FileBrowser for FileBrowserModel {
    fn selected_files(&self) -> Vec<Arc<FileNode>> {
        self.selection.snapshot()
    }

    fn replace_selection(&self, files: Vec<Arc<FileNode>>) {
        let _scope = self.selection.suspend_notifications();
        self.selection.replace_range(files);
    }

    fn root_directories(&self) -> Vec<Arc<DirectoryNode>> {
        self.roots.read().clone()
    }
}

/// The displayed, filtered record table.
#[derive(Debug, Default)]
pub struct LogTable {
    records: ObservableList<Arc<LogRecord>>,
}

impl LogTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &ObservableList<Arc<LogRecord>> {
        &self.records
    }

    /// Copy of the current table contents.
    pub fn snapshot(&self) -> Vec<Arc<LogRecord>> {
        self.records.snapshot()
    }

    /// Replace the table as one batched mutation.
    pub fn replace(&self, records: Vec<Arc<LogRecord>>) {
        let _scope = self.records.suspend_notifications();
        self.records.replace_range(records);
    }
}
