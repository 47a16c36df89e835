// logsieve - app/loader.rs
//
// File loader: creates file nodes and (re)loads their records.
//
// A load reads and parses the file, publishes the records as one batched
// replacement on the presentation context, re-applies the record filter and
// schedules a background index build. Failures are logged and absorbed; the
// node keeps the records and state it had before the attempt.

use crate::app::dispatcher::Dispatcher;
use crate::app::filter_service::FilterService;
use crate::app::index::IndexSearch;
use crate::app::reader::RecordReader;
use crate::core::model::LoadState;
use crate::core::tree::FileNode;
use crate::util::error::LoadError;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Creates, loads, reloads and unloads file nodes.
pub struct FileNodeService {
    reader: Arc<dyn RecordReader>,
    index: Arc<dyn IndexSearch>,
    dispatcher: Arc<dyn Dispatcher>,
    filter: Arc<FilterService>,
}

impl FileNodeService {
    pub fn new(
        reader: Arc<dyn RecordReader>,
        index: Arc<dyn IndexSearch>,
        dispatcher: Arc<dyn Dispatcher>,
        filter: Arc<FilterService>,
    ) -> Self {
        Self {
            reader,
            index,
            dispatcher,
            filter,
        }
    }

    /// Build an unloaded node for `path`.
    pub fn create_file_node(&self, path: impl AsRef<Path>) -> Result<Arc<FileNode>, LoadError> {
        let node = FileNode::from_path(path)?;
        tracing::trace!(
            file = %node.path().display(),
            date = ?node.file_date(),
            "File node created"
        );
        Ok(Arc::new(node))
    }

    /// Read `file` and publish its records. Concurrent loads of the same
    /// file run one after another. Returns the state the node ends in.
    pub fn load_file_node(&self, file: &Arc<FileNode>) -> LoadState {
        let _guard = file.lock_for_load();
        let started = Instant::now();
        let previous = file.load_state();
        file.set_load_state(LoadState::Loading);
        tracing::debug!(file = %file.path().display(), "Loading file node");

        let records = match self.reader.load_records_from_file(file) {
            Ok(records) => records,
            Err(e) => {
                let fallback = if previous == LoadState::Loaded {
                    LoadState::Loaded
                } else {
                    LoadState::Unloaded
                };
                file.set_load_state(fallback);
                tracing::warn!(
                    file = %file.path().display(),
                    error = %e,
                    "Failed to load file node"
                );
                return fallback;
            }
        };

        let count = records.len();
        let records: Vec<_> = records.into_iter().map(Arc::new).collect();
        let target = Arc::clone(file);
        let index = Arc::clone(&self.index);
        // The build must snapshot the published records, so it is scheduled
        // from the presentation context after the replacement.
        self.dispatcher.invoke(Box::new(move || {
            target.replace_records(records);
            target.set_load_state(LoadState::Loaded);
            index.ensure_full_text_index_async(target);
        }));

        self.filter.apply_log_records_filter(None);
        tracing::debug!(
            file = %file.path().display(),
            records = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "File node loaded"
        );
        LoadState::Loaded
    }

    /// Same as [`load_file_node`](Self::load_file_node); the index is
    /// rebuilt from the new records.
    pub fn reload_file_node(&self, file: &Arc<FileNode>) -> LoadState {
        self.load_file_node(file)
    }

    /// Load on the background pool.
    pub fn load_file_node_async(self: Arc<Self>, file: Arc<FileNode>) {
        rayon::spawn(move || {
            let state = self.load_file_node(&file);
            tracing::trace!(
                file = %file.path().display(),
                state = ?state,
                "Background load finished"
            );
        });
    }

    /// Drop the records and index of `file`.
    pub fn unload_file_node(&self, file: &Arc<FileNode>) {
        let _guard = file.lock_for_load();
        let target = Arc::clone(file);
        let index = Arc::clone(&self.index);
        self.dispatcher.invoke(Box::new(move || {
            target.replace_records(Vec::new());
            index.remove_index(target.id());
            target.set_load_state(LoadState::Unloaded);
        }));
        self.filter.apply_log_records_filter(Some(file));
        tracing::debug!(file = %file.path().display(), "File node unloaded");
    }
}

impl std::fmt::Debug for FileNodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNodeService").finish_non_exhaustive()
    }
}
