// logsieve - app/filter_service.rs
//
// Filter/query engine: computes the displayed record table from the current
// filter and file selection, and the visibility of every tree node.
//
// Two record paths:
//   - field path: records of each accepted file in file order, then source
//     order within a file, kept when event kind and message match;
//   - ranked path (full-text template): per-file index hits merged across
//     files and sorted by ascending relevance score. File order is not kept.

use crate::app::dispatcher::Dispatcher;
use crate::app::index::IndexSearch;
use crate::app::state::{FileBrowser, LogTable};
use crate::core::filter::Filter;
use crate::core::model::LogRecord;
use crate::core::tree::FileNode;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Records of `files` that pass `filter`.
pub fn filter_records(
    filter: &Filter,
    files: &[Arc<FileNode>],
    index: &dyn IndexSearch,
) -> Vec<Arc<LogRecord>> {
    let template = &filter.search_template;

    if !template.is_full_text_active() {
        let matcher = match filter.message_matcher() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "Search template rejected; nothing matches");
                return Vec::new();
            }
        };
        return files
            .iter()
            .filter(|file| filter.accepts_file(file))
            .flat_map(|file| file.records().snapshot())
            .filter(|record| filter.accepts_record(record, &matcher))
            .collect();
    }

    let predicate = |record: &LogRecord| filter.accepts_event_kind(record.event_kind);
    let mut scored: Vec<_> = files
        .iter()
        .filter(|file| filter.accepts_file(file) && !file.records().is_empty())
        .flat_map(|file| index.select(file, &template.template_string, &predicate))
        .collect();
    scored.sort_by(|a, b| a.score.total_cmp(&b.score));
    scored.into_iter().map(|m| m.record).collect()
}

/// Owns the current filter and applies it to the table and the tree.
pub struct FilterService {
    filter: RwLock<Filter>,
    index: Arc<dyn IndexSearch>,
    dispatcher: Arc<dyn Dispatcher>,
    log_table: Arc<LogTable>,
    browser: Arc<dyn FileBrowser>,
}

impl FilterService {
    pub fn new(
        index: Arc<dyn IndexSearch>,
        dispatcher: Arc<dyn Dispatcher>,
        log_table: Arc<LogTable>,
        browser: Arc<dyn FileBrowser>,
    ) -> Self {
        Self {
            filter: RwLock::new(Filter::default()),
            index,
            dispatcher,
            log_table,
            browser,
        }
    }

    /// Copy of the current filter.
    pub fn filter(&self) -> Filter {
        self.filter.read().clone()
    }

    /// Replace the current filter. Does not re-apply it.
    pub fn set_filter(&self, filter: Filter) {
        tracing::debug!(
            kinds = filter.event_kinds.len(),
            date_range = filter.date_range.is_some(),
            full_text = filter.search_template.use_full_text_search,
            template_len = filter.search_template.template_string.len(),
            "Filter changed"
        );
        *self.filter.write() = filter;
    }

    /// Recompute the record table from the selected files.
    ///
    /// With `Some(file)`, nothing happens unless that file is selected.
    pub fn apply_log_records_filter(&self, file: Option<&Arc<FileNode>>) {
        let selected = self.browser.selected_files();
        if let Some(file) = file {
            if !selected.iter().any(|f| f.id() == file.id()) {
                tracing::trace!(file = %file.path().display(), "Not selected; filter skipped");
                return;
            }
        }

        let old_ids: HashSet<u64> = self.log_table.snapshot().iter().map(|r| r.id).collect();
        let filter = self.filter();
        let index = Arc::clone(&self.index);
        let log_table = Arc::clone(&self.log_table);

        self.dispatcher.invoke(Box::new(move || {
            let filtered = filter_records(&filter, &selected, index.as_ref());
            tracing::debug!(
                files = selected.len(),
                records = filtered.len(),
                "Record filter applied"
            );

            let newly_shown: Vec<_> = filtered
                .iter()
                .filter(|r| !old_ids.contains(&r.id))
                .filter_map(|r| r.file())
                .collect();
            log_table.replace(filtered);
            for file in newly_shown {
                file.set_expanded(true);
            }
        }));
    }

    /// Prune the selection to files the filter accepts, then recompute the
    /// visibility of every file and directory.
    pub fn apply_files_filter(&self) {
        let filter = self.filter();
        let browser = Arc::clone(&self.browser);

        self.dispatcher.invoke(Box::new(move || {
            let selected = browser.selected_files();
            if !selected.is_empty() {
                let (kept, dropped): (Vec<_>, Vec<_>) =
                    selected.into_iter().partition(|f| filter.accepts_file(f));
                for file in &dropped {
                    file.set_selected(false);
                }
                if !dropped.is_empty() {
                    tracing::debug!(dropped = dropped.len(), "Selection pruned by filter");
                }
                browser.replace_selection(kept);
            }

            let roots = browser.root_directories();
            let mut visible = 0usize;
            for file in roots.iter().flat_map(|root| root.all_nested_files()) {
                let accepted = filter.accepts_file(&file);
                visible += usize::from(accepted);
                file.set_visible(accepted);
            }
            for root in &roots {
                root.update_visibility();
            }
            tracing::debug!(visible_files = visible, "Files filter applied");
        }));
    }
}

impl std::fmt::Debug for FilterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterService")
            .field("filter", &*self.filter.read())
            .finish_non_exhaustive()
    }
}
