// logsieve - app/index.rs
//
// Full-text index service.
//
// Each file gets its own in-RAM tantivy index over its record messages. An
// index is built from a versioned snapshot of the file's records and is
// replaced wholesale on rebuild, never mutated, so a concurrent query always
// sees one complete index.
//
// Builds are single-flight per file: while a build for a file is running,
// further requests for the same file only mark the running build for one
// more pass, which happens only if the records changed in the meantime.
//
// Lock order: `builds` before `indexes`.

use crate::core::model::{IndexState, LogRecord, ScoredMatch};
use crate::core::tree::{FileId, FileNode};
use crate::util::constants;
use crate::util::error::IndexError;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

/// Index build and query operations used by the filter engine and loader.
pub trait IndexSearch: Send + Sync {
    /// Make sure `file` has an index over its current records, building it
    /// on the calling thread if needed.
    fn ensure_full_text_index(&self, file: &Arc<FileNode>);

    /// Schedule [`ensure_full_text_index`](Self::ensure_full_text_index) on
    /// the background pool and return immediately.
    fn ensure_full_text_index_async(&self, file: Arc<FileNode>);

    /// Records of `file` matching `query` and `predicate`, each with its
    /// relevance score (lower is more relevant). Returns nothing when the
    /// file has no index or the query is rejected.
    fn select(
        &self,
        file: &FileNode,
        query: &str,
        predicate: &dyn Fn(&LogRecord) -> bool,
    ) -> Vec<ScoredMatch>;

    /// Drop the index of a file, if any.
    fn remove_index(&self, id: FileId);
}

/// Build settings.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    /// tantivy writer arena per build.
    pub writer_memory: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            writer_memory: constants::DEFAULT_INDEX_WRITER_MEMORY,
        }
    }
}

/// Counters since the service was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub builds_started: u64,
    pub builds_completed: u64,
    pub builds_failed: u64,
    /// Requests folded into a build that was already running.
    pub requests_coalesced: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    coalesced: AtomicU64,
}

/// In-flight build of one file.
#[derive(Debug, Default)]
struct BuildSlot {
    /// Another request arrived while building.
    rerun: bool,
}

type BuiltHook = Arc<dyn Fn(&Arc<FileNode>) + Send + Sync>;

struct Shared {
    config: IndexConfig,
    indexes: RwLock<HashMap<FileId, Arc<FileIndex>>>,
    builds: Mutex<HashMap<FileId, BuildSlot>>,
    /// Scheduled async builds that have not finished.
    pending: Mutex<usize>,
    idle: Condvar,
    counters: Counters,
    on_index_built: RwLock<Option<BuiltHook>>,
}

/// Per-file full-text index service.
#[derive(Clone)]
pub struct FullTextIndexService {
    shared: Arc<Shared>,
}

impl FullTextIndexService {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                indexes: RwLock::new(HashMap::new()),
                builds: Mutex::new(HashMap::new()),
                pending: Mutex::new(0),
                idle: Condvar::new(),
                counters: Counters::default(),
                on_index_built: RwLock::new(None),
            }),
        }
    }

    /// Register a callback run after every successful build, on the thread
    /// that performed it.
    pub fn set_on_index_built<F>(&self, hook: F)
    where
        F: Fn(&Arc<FileNode>) + Send + Sync + 'static,
    {
        *self.shared.on_index_built.write() = Some(Arc::new(hook));
    }

    pub fn index_state(&self, id: FileId) -> IndexState {
        let builds = self.shared.builds.lock();
        if builds.contains_key(&id) {
            IndexState::Building
        } else if self.shared.indexes.read().contains_key(&id) {
            IndexState::Indexed
        } else {
            IndexState::NoIndex
        }
    }

    pub fn stats(&self) -> IndexStats {
        let c = &self.shared.counters;
        IndexStats {
            builds_started: c.started.load(Ordering::SeqCst),
            builds_completed: c.completed.load(Ordering::SeqCst),
            builds_failed: c.failed.load(Ordering::SeqCst),
            requests_coalesced: c.coalesced.load(Ordering::SeqCst),
        }
    }

    /// Block until every build scheduled with `ensure_full_text_index_async`
    /// has finished.
    pub fn wait_for_idle(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }
}

impl Default for FullTextIndexService {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl std::fmt::Debug for FullTextIndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullTextIndexService")
            .field("config", &self.shared.config)
            .field("indexes", &self.shared.indexes.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl IndexSearch for FullTextIndexService {
    fn ensure_full_text_index(&self, file: &Arc<FileNode>) {
        self.shared.ensure(file);
    }

    fn ensure_full_text_index_async(&self, file: Arc<FileNode>) {
        *self.shared.pending.lock() += 1;
        let shared = Arc::clone(&self.shared);
        rayon::spawn(move || {
            let _done = PendingGuard(&shared);
            shared.ensure(&file);
        });
    }

    fn select(
        &self,
        file: &FileNode,
        query: &str,
        predicate: &dyn Fn(&LogRecord) -> bool,
    ) -> Vec<ScoredMatch> {
        let Some(index) = self.shared.indexes.read().get(&file.id()).cloned() else {
            tracing::debug!(file = %file.path().display(), "No full-text index yet");
            return Vec::new();
        };
        match index.search(query, predicate) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(file = %file.path().display(), error = %e, "Full-text query failed");
                Vec::new()
            }
        }
    }

    fn remove_index(&self, id: FileId) {
        if self.shared.indexes.write().remove(&id).is_some() {
            tracing::debug!(file = %id, "Full-text index dropped");
        }
    }
}

/// Decrements the pending count on every exit path of an async build.
struct PendingGuard<'a>(&'a Shared);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.0.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

impl Shared {
    fn ensure(&self, file: &Arc<FileNode>) {
        let id = file.id();
        {
            let mut builds = self.builds.lock();
            if let Some(slot) = builds.get_mut(&id) {
                slot.rerun = true;
                self.counters.coalesced.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(file = %file.path().display(), "Index build already running");
                return;
            }
            builds.insert(id, BuildSlot::default());
        }

        loop {
            if !self.is_current(file) {
                self.build(file);
            }

            let mut builds = self.builds.lock();
            match builds.get_mut(&id) {
                Some(slot) if slot.rerun => slot.rerun = false,
                _ => {
                    builds.remove(&id);
                    break;
                }
            }
        }
    }

    fn is_current(&self, file: &FileNode) -> bool {
        self.indexes
            .read()
            .get(&file.id())
            .is_some_and(|index| index.version == file.records().version())
    }

    fn build(&self, file: &Arc<FileNode>) {
        let started = Instant::now();
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let (records, version) = file.records().snapshot_versioned();
        let record_count = records.len();

        match FileIndex::build(records, version, self.config.writer_memory) {
            Ok(index) => {
                self.indexes.write().insert(file.id(), Arc::new(index));
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(
                    file = %file.path().display(),
                    records = record_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Full-text index built"
                );
                let hook = self.on_index_built.read().clone();
                if let Some(hook) = hook {
                    hook(file);
                }
            }
            Err(source) => {
                self.indexes.write().remove(&file.id());
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                let err = IndexError::Build {
                    path: file.path().to_path_buf(),
                    source,
                };
                tracing::warn!(error = %err, "Full-text index build failed");
            }
        }
    }
}

/// Immutable index over one snapshot of a file's records.
struct FileIndex {
    /// Record-list version the index was built from.
    version: u64,
    records: Vec<Arc<LogRecord>>,
    index: Index,
    reader: IndexReader,
    message: Field,
    ordinal: Field,
}

impl FileIndex {
    fn build(
        records: Vec<Arc<LogRecord>>,
        version: u64,
        writer_memory: usize,
    ) -> tantivy::Result<Self> {
        let mut builder = Schema::builder();
        let message = builder.add_text_field(constants::INDEX_FIELD_MESSAGE, TEXT);
        let ordinal = builder.add_u64_field(constants::INDEX_FIELD_ORDINAL, STORED);
        let index = Index::create_in_ram(builder.build());

        let mut writer: IndexWriter = index.writer_with_num_threads(1, writer_memory)?;
        for (i, record) in records.iter().enumerate() {
            writer.add_document(doc!(
                message => record.message.as_str(),
                ordinal => i as u64,
            ))?;
        }
        writer.commit()?;
        writer.wait_merging_threads()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            version,
            records,
            index,
            reader,
            message,
            ordinal,
        })
    }

    fn search(
        &self,
        query: &str,
        predicate: &dyn Fn(&LogRecord) -> bool,
    ) -> Result<Vec<ScoredMatch>, IndexError> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.message]);
        let parsed = parser
            .parse_query(query)
            .map_err(|source| IndexError::InvalidQuery {
                query: query.to_string(),
                source,
            })?;

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&*parsed, &TopDocs::with_limit(self.records.len()))
            .map_err(|source| IndexError::Search { source })?;

        let mut matches = Vec::with_capacity(top_docs.len());
        for (bm25, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|source| IndexError::Search { source })?;
            let Some(ordinal) = doc.get_first(self.ordinal).and_then(|v| v.as_u64()) else {
                continue;
            };
            let Some(record) = self.records.get(ordinal as usize) else {
                continue;
            };
            if predicate(record) {
                matches.push(ScoredMatch {
                    record: Arc::clone(record),
                    // BM25 grows with relevance; invert so lower is better.
                    score: 1.0 / (1.0 + bm25),
                });
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::EventKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;
    use std::time::Duration;

    fn file_with(messages: &[(EventKind, &str)]) -> Arc<FileNode> {
        let file = Arc::new(FileNode::from_path("/logs/idx.log").unwrap());
        let records = messages
            .iter()
            .enumerate()
            .map(|(i, (kind, msg))| {
                Arc::new(LogRecord::new(&file, i as u64 + 1, chrono::Utc::now(), *kind, *msg))
            })
            .collect();
        file.replace_records(records);
        file
    }

    fn messages(matches: &[ScoredMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.record.message.as_str()).collect()
    }

    #[test]
    fn test_build_and_select() {
        let service = FullTextIndexService::default();
        let file = file_with(&[
            (EventKind::Error, "disk boom on volume"),
            (EventKind::Info, "all ok"),
            (EventKind::Warning, "boom boom boom"),
        ]);
        assert_eq!(service.index_state(file.id()), IndexState::NoIndex);
        service.ensure_full_text_index(&file);
        assert_eq!(service.index_state(file.id()), IndexState::Indexed);

        let matches = service.select(&file, "boom", &|_| true);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.score > 0.0 && m.score < 1.0));
        assert!(!messages(&matches).contains(&"all ok"));
    }

    #[test]
    fn test_select_applies_predicate() {
        let service = FullTextIndexService::default();
        let file = file_with(&[
            (EventKind::Error, "boom one"),
            (EventKind::Info, "boom two"),
        ]);
        service.ensure_full_text_index(&file);
        let matches = service.select(&file, "boom", &|r| r.event_kind == EventKind::Error);
        assert_eq!(messages(&matches), vec!["boom one"]);
    }

    #[test]
    fn test_select_without_index_is_empty() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom")]);
        assert!(service.select(&file, "boom", &|_| true).is_empty());
    }

    #[test]
    fn test_invalid_query_is_empty() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom")]);
        service.ensure_full_text_index(&file);
        assert!(service.select(&file, "nosuchfield:boom", &|_| true).is_empty());
    }

    #[test]
    fn test_current_index_is_not_rebuilt() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom")]);
        service.ensure_full_text_index(&file);
        service.ensure_full_text_index(&file);
        assert_eq!(service.stats().builds_started, 1);
    }

    #[test]
    fn test_reload_replaces_index() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "alpha")]);
        service.ensure_full_text_index(&file);

        let fresh = vec![Arc::new(LogRecord::new(
            &file,
            1,
            chrono::Utc::now(),
            EventKind::Info,
            "beta",
        ))];
        file.replace_records(fresh);
        service.ensure_full_text_index(&file);

        assert_eq!(service.stats().builds_completed, 2);
        assert!(service.select(&file, "alpha", &|_| true).is_empty());
        assert_eq!(messages(&service.select(&file, "beta", &|_| true)), vec!["beta"]);
    }

    #[test]
    fn test_request_during_build_is_coalesced() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom")]);

        // Simulate a build in flight for this file.
        service
            .shared
            .builds
            .lock()
            .insert(file.id(), BuildSlot::default());
        service.ensure_full_text_index(&file);

        assert_eq!(service.stats().requests_coalesced, 1);
        assert_eq!(service.stats().builds_started, 0);
        assert!(service.shared.builds.lock()[&file.id()].rerun);
        assert_eq!(service.index_state(file.id()), IndexState::Building);
    }

    #[test]
    fn test_concurrent_requests_run_one_build_at_a_time() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom"), (EventKind::Info, "quiet")]);

        // The hook runs inside the build, so it doubles as an in-flight gauge.
        // The first build is held open until every other request has arrived.
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));
        {
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            let release = Arc::clone(&release);
            service.set_on_index_built(move |_| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(1));
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        const REQUESTS: u64 = 8;
        let barrier = Arc::new(Barrier::new(REQUESTS as usize));
        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let service = service.clone();
                let file = Arc::clone(&file);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    service.ensure_full_text_index(&file);
                })
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(10);
        while service.stats().requests_coalesced < REQUESTS - 1 {
            assert!(Instant::now() < deadline, "requests were not coalesced");
            std::thread::sleep(Duration::from_millis(1));
        }
        release.store(true, Ordering::SeqCst);
        for h in handles {
            h.join().unwrap();
        }

        let stats = service.stats();
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(stats.builds_started, 1);
        assert_eq!(stats.requests_coalesced, REQUESTS - 1);
        assert_eq!(stats.builds_started + stats.requests_coalesced, REQUESTS);
        assert_eq!(stats.builds_failed, 0);
        assert_eq!(service.index_state(file.id()), IndexState::Indexed);
        assert_eq!(messages(&service.select(&file, "boom", &|_| true)), vec!["boom"]);
    }

    #[test]
    fn test_rerun_after_records_change_is_serialised() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "alpha")]);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let builds = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(AtomicBool::new(false));
        {
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            let builds = Arc::clone(&builds);
            let release = Arc::clone(&release);
            let file = Arc::downgrade(&file);
            service.set_on_index_built(move |_| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                // Change the records during the first build so the coalesced
                // request forces exactly one more pass.
                if builds.fetch_add(1, Ordering::SeqCst) == 0 {
                    if let Some(file) = file.upgrade() {
                        let fresh = vec![Arc::new(LogRecord::new(
                            &file,
                            1,
                            chrono::Utc::now(),
                            EventKind::Info,
                            "beta",
                        ))];
                        file.replace_records(fresh);
                    }
                    while !release.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        let first = {
            let service = service.clone();
            let file = Arc::clone(&file);
            std::thread::spawn(move || service.ensure_full_text_index(&file))
        };
        while builds.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        service.ensure_full_text_index(&file);
        release.store(true, Ordering::SeqCst);
        first.join().unwrap();

        let stats = service.stats();
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(stats.requests_coalesced, 1);
        assert_eq!(stats.builds_started, 2);
        assert!(service.select(&file, "alpha", &|_| true).is_empty());
        assert_eq!(messages(&service.select(&file, "beta", &|_| true)), vec!["beta"]);
    }

    #[test]
    fn test_async_build_and_wait_for_idle() {
        let service = FullTextIndexService::default();
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        service.set_on_index_built(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        let file = file_with(&[(EventKind::Info, "boom")]);
        service.ensure_full_text_index_async(Arc::clone(&file));
        service.wait_for_idle();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(service.index_state(file.id()), IndexState::Indexed);
    }

    #[test]
    fn test_remove_index() {
        let service = FullTextIndexService::default();
        let file = file_with(&[(EventKind::Info, "boom")]);
        service.ensure_full_text_index(&file);
        service.remove_index(file.id());
        assert_eq!(service.index_state(file.id()), IndexState::NoIndex);
        assert!(service.select(&file, "boom", &|_| true).is_empty());
    }

    #[test]
    fn test_too_small_writer_arena_fails_softly() {
        let service = FullTextIndexService::new(IndexConfig { writer_memory: 1_000 });
        let file = file_with(&[(EventKind::Info, "boom")]);
        service.ensure_full_text_index(&file);
        assert_eq!(service.stats().builds_failed, 1);
        assert_eq!(service.index_state(file.id()), IndexState::NoIndex);
    }
}
