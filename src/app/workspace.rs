// logsieve - app/workspace.rs
//
// Composition root: wires the browser model, record table, index service,
// filter engine and loader around one presentation dispatcher.

use crate::app::dispatcher::{Dispatcher, InlineDispatcher};
use crate::app::filter_service::FilterService;
use crate::app::index::{FullTextIndexService, IndexConfig};
use crate::app::loader::FileNodeService;
use crate::app::reader::LogFileReader;
use crate::app::state::{FileBrowser, FileBrowserModel, LogTable};
use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::filter::Filter;
use crate::core::model::LogRecord;
use crate::core::parser::ParseConfig;
use crate::core::tree::{DirectoryNode, FileNode};
use crate::platform::config::AppConfig;
use crate::util::error::DiscoveryError;
use rayon::prelude::*;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, Weak};

/// Everything a workspace needs from configuration.
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    pub discovery: DiscoveryConfig,
    pub parse: ParseConfig,
    pub large_file_threshold: u64,
    pub index: IndexConfig,
}

impl WorkspaceOptions {
    /// Translate a validated [`AppConfig`].
    pub fn from_config(config: &AppConfig) -> Self {
        let mut parse = match config.line_pattern.as_deref().map(Regex::new) {
            Some(Ok(pattern)) => ParseConfig::with_pattern(pattern),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Configured line pattern rejected; using built-in");
                ParseConfig::default()
            }
            None => ParseConfig::default(),
        };
        parse.max_entry_size = config.max_entry_size;

        Self {
            discovery: DiscoveryConfig {
                max_depth: config.max_depth,
                max_files: config.max_files,
                include_patterns: config.include_patterns.clone(),
                exclude_patterns: config.exclude_patterns.clone(),
            },
            parse,
            large_file_threshold: config.large_file_threshold,
            index: IndexConfig {
                writer_memory: config.index_writer_memory,
            },
        }
    }
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A browsed set of log directories and the services that act on them.
pub struct Workspace {
    discovery: DiscoveryConfig,
    browser: Arc<FileBrowserModel>,
    log_table: Arc<LogTable>,
    index: Arc<FullTextIndexService>,
    filter: Arc<FilterService>,
    loader: Arc<FileNodeService>,
}

impl Workspace {
    pub fn new(options: WorkspaceOptions, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let browser = Arc::new(FileBrowserModel::new());
        let log_table = Arc::new(LogTable::new());
        let index = Arc::new(FullTextIndexService::new(options.index));

        let filter = Arc::new(FilterService::new(
            index.clone(),
            Arc::clone(&dispatcher),
            Arc::clone(&log_table),
            browser.clone(),
        ));

        // Ranked results depend on the index, so a finished build re-runs
        // the record filter for its file.
        let weak: Weak<FilterService> = Arc::downgrade(&filter);
        index.set_on_index_built(move |file| {
            if let Some(filter) = weak.upgrade() {
                if filter.filter().search_template.is_full_text_active() {
                    filter.apply_log_records_filter(Some(file));
                }
            }
        });

        let reader = Arc::new(LogFileReader::new(
            options.parse,
            options.large_file_threshold,
        ));
        let loader = Arc::new(FileNodeService::new(
            reader,
            index.clone(),
            dispatcher,
            Arc::clone(&filter),
        ));

        Self {
            discovery: options.discovery,
            browser,
            log_table,
            index,
            filter,
            loader,
        }
    }

    /// Workspace whose presentation actions run on the calling thread.
    pub fn headless(options: WorkspaceOptions) -> Self {
        Self::new(options, Arc::new(InlineDispatcher))
    }

    /// Discover `root` and add it to the browsed roots. Returns the new root
    /// and any non-fatal discovery warnings.
    pub fn open_directory(
        &self,
        root: &Path,
    ) -> Result<(Arc<DirectoryNode>, Vec<String>), DiscoveryError> {
        let (tree, warnings) = discovery::discover_tree(root, &self.discovery)?;
        self.browser.add_root(Arc::clone(&tree));
        self.filter.apply_files_filter();
        tracing::info!(
            root = %root.display(),
            files = tree.all_nested_files().len(),
            warnings = warnings.len(),
            "Directory opened"
        );
        Ok((tree, warnings))
    }

    /// Select every visible file under every root.
    pub fn select_all(&self) {
        for root in self.browser.root_directories() {
            for file in root.all_nested_files() {
                if file.is_visible() {
                    self.browser.select(&file);
                }
            }
        }
    }

    /// Load every selected file on the worker pool and wait for the loads
    /// and the index builds they schedule. Builds are scheduled when the
    /// dispatcher runs the publishing action, so with a queued dispatcher
    /// the wait only covers builds already started.
    pub fn load_selected(&self) {
        let files = self.browser.selected_files();
        files.par_iter().for_each(|file| {
            self.loader.load_file_node(file);
        });
        self.index.wait_for_idle();
    }

    /// Detach `file` from the browsed tree. The file is deselected and its
    /// records and index are dropped. Returns false if no root contains it.
    pub fn remove_file(&self, file: &Arc<FileNode>) -> bool {
        let removed = self
            .browser
            .root_directories()
            .iter()
            .any(|root| root.remove_file(file.id()).is_some());
        if !removed {
            tracing::debug!(file = %file.path().display(), "File not in any root");
            return false;
        }

        self.browser.deselect(file.id());
        self.loader.unload_file_node(file);
        self.refresh();
        tracing::info!(file = %file.path().display(), "File removed from tree");
        true
    }

    /// Replace the filter and apply it to the tree and the table.
    pub fn set_filter(&self, filter: Filter) {
        self.filter.set_filter(filter);
        self.refresh();
    }

    /// Re-apply the current filter.
    pub fn refresh(&self) {
        self.filter.apply_files_filter();
        self.filter.apply_log_records_filter(None);
    }

    /// Block until no index build is scheduled.
    pub fn wait_for_idle(&self) {
        self.index.wait_for_idle();
    }

    /// Current table contents.
    pub fn records(&self) -> Vec<Arc<LogRecord>> {
        self.log_table.snapshot()
    }

    pub fn selected_files(&self) -> Vec<Arc<FileNode>> {
        self.browser.selected_files()
    }

    pub fn browser(&self) -> &Arc<FileBrowserModel> {
        &self.browser
    }

    pub fn log_table(&self) -> &Arc<LogTable> {
        &self.log_table
    }

    pub fn index(&self) -> &Arc<FullTextIndexService> {
        &self.index
    }

    pub fn filter_service(&self) -> &Arc<FilterService> {
        &self.filter
    }

    pub fn loader(&self) -> &Arc<FileNodeService> {
        &self.loader
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("roots", &self.browser.root_directories().len())
            .field("selected", &self.browser.selected_files().len())
            .finish_non_exhaustive()
    }
}
