// logsieve - tests/e2e_search.rs
//
// End-to-end tests for the load, index and filter pipeline.
//
// These run against the fixture tree on disk with the real walkdir
// traversal, the real parser and real tantivy indexes. No stubs.

use chrono::NaiveDate;
use logsieve::app::dispatcher::QueuedDispatcher;
use logsieve::app::workspace::{Workspace, WorkspaceOptions};
use logsieve::core::export;
use logsieve::core::filter::{DateRange, Filter, SearchTemplate};
use logsieve::core::model::{EventKind, IndexState, LoadState, LogRecord};
use logsieve::util::error::DiscoveryError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("logs")
}

/// Open, select and load a directory.
fn loaded(root: &Path) -> Workspace {
    let ws = Workspace::headless(WorkspaceOptions::default());
    let (_, warnings) = ws.open_directory(root).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    ws.select_all();
    ws.load_selected();
    ws.refresh();
    ws
}

fn search(ws: &Workspace, template: SearchTemplate) -> Vec<Arc<LogRecord>> {
    ws.set_filter(Filter {
        search_template: template,
        ..Filter::default()
    });
    ws.records()
}

fn messages(records: &[Arc<LogRecord>]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.message.lines().next().unwrap_or_default().to_string())
        .collect()
}

fn file_name(record: &LogRecord) -> String {
    record
        .file()
        .unwrap()
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

// =============================================================================
// Discovery and loading
// =============================================================================

#[test]
fn e2e_discovers_and_loads_fixture_tree() {
    let ws = loaded(&fixtures_root());

    let names: Vec<String> = ws
        .selected_files()
        .iter()
        .map(|f| f.display_name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "App.Service_2024-03-10_000001_1.log",
            "notes.log",
            "Worker_2024-03-11_000002_1.log",
        ]
    );
    assert!(ws
        .selected_files()
        .iter()
        .all(|f| f.load_state() == LoadState::Loaded));
    assert!(ws
        .selected_files()
        .iter()
        .all(|f| ws.index().index_state(f.id()) == IndexState::Indexed));

    // Field path keeps file order, then line order.
    let records = ws.records();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0].message, "Sync started for tenant alpha");
    assert_eq!(records[5].message, "Disk space low on volume C");
    assert_eq!(records[9].message, "Retrying job 42");
}

#[test]
fn e2e_continuation_lines_join_previous_record() {
    let ws = loaded(&fixtures_root());
    let error = ws
        .records()
        .into_iter()
        .find(|r| r.message.starts_with("Connection timeout"))
        .unwrap();
    assert_eq!(
        error.message,
        "Connection timeout while contacting catalog\n\tat App.Services.Sync.Run()\n\tat App.Program.Main()"
    );
    assert_eq!(error.event_kind, EventKind::Error);
    assert_eq!(error.source.as_deref(), Some("App.Services.Sync"));
    assert_eq!(error.thread.as_deref(), Some("12"));
    assert_eq!(error.line_number, 3);
}

#[test]
fn e2e_missing_root_is_reported() {
    let ws = Workspace::headless(WorkspaceOptions::default());
    let result = ws.open_directory(Path::new("/nonexistent/logsieve-e2e-root"));
    assert!(
        matches!(result, Err(DiscoveryError::RootNotFound { .. })),
        "expected RootNotFound, got {result:?}"
    );
}

// =============================================================================
// Field path
// =============================================================================

#[test]
fn e2e_substring_search_is_case_insensitive_by_default() {
    let ws = loaded(&fixtures_root());
    let found = search(&ws, SearchTemplate::substring("TIMEOUT"));
    assert_eq!(
        messages(&found),
        vec![
            "Connection timeout while contacting catalog",
            "Job 42 failed: timeout timeout timeout",
        ]
    );
}

#[test]
fn e2e_match_case_search() {
    let ws = loaded(&fixtures_root());
    let case_sensitive = |text: &str| SearchTemplate {
        match_case: true,
        ..SearchTemplate::substring(text)
    };
    // Continuation lines are part of the message.
    assert_eq!(search(&ws, case_sensitive("Sync")).len(), 3);
    assert!(search(&ws, case_sensitive("sync")).is_empty());
}

#[test]
fn e2e_whole_word_search() {
    let ws = loaded(&fixtures_root());
    let whole_word = |text: &str| SearchTemplate {
        match_whole_word: true,
        ..SearchTemplate::substring(text)
    };
    assert_eq!(
        messages(&search(&ws, whole_word("job"))),
        vec!["Job 42 failed: timeout timeout timeout", "Retrying job 42"]
    );
    assert!(search(&ws, whole_word("jo")).is_empty());
}

#[test]
fn e2e_event_kind_filter() {
    let ws = loaded(&fixtures_root());
    ws.set_filter(Filter::with_event_kinds(&[EventKind::Warning]));
    let found = ws.records();
    assert_eq!(
        messages(&found),
        vec!["Slow response from catalog endpoint", "Disk space low on volume C"]
    );
}

#[test]
fn e2e_date_range_prunes_files_but_keeps_undated() {
    let ws = loaded(&fixtures_root());
    let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
    ws.set_filter(Filter {
        date_range: Some(DateRange {
            start: day,
            end: day,
        }),
        ..Filter::default()
    });

    let selected: Vec<String> = ws
        .selected_files()
        .iter()
        .map(|f| f.display_name().to_string())
        .collect();
    assert_eq!(selected, vec!["notes.log", "Worker_2024-03-11_000002_1.log"]);

    let records = ws.records();
    assert_eq!(records.len(), 5);
    assert!(records
        .iter()
        .all(|r| file_name(r) != "App.Service_2024-03-10_000001_1.log"));
}

// =============================================================================
// Ranked path
// =============================================================================

#[test]
fn e2e_full_text_search_ranks_across_files() {
    let ws = loaded(&fixtures_root());
    let found = search(&ws, SearchTemplate::full_text("timeout"));

    // Relevance order, not file order: the repeated term wins.
    assert_eq!(
        messages(&found),
        vec![
            "Job 42 failed: timeout timeout timeout",
            "Connection timeout while contacting catalog",
        ]
    );
}

#[test]
fn e2e_full_text_search_respects_event_kinds_and_dates() {
    let ws = loaded(&fixtures_root());

    ws.set_filter(Filter {
        event_kinds: [EventKind::Error].into_iter().collect(),
        search_template: SearchTemplate::full_text("job"),
        ..Filter::default()
    });
    assert_eq!(
        messages(&ws.records()),
        vec!["Job 42 failed: timeout timeout timeout"]
    );

    let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    ws.set_filter(Filter {
        date_range: Some(DateRange {
            start: day,
            end: day,
        }),
        search_template: SearchTemplate::full_text("timeout"),
        ..Filter::default()
    });
    assert_eq!(
        messages(&ws.records()),
        vec!["Connection timeout while contacting catalog"]
    );
}

#[test]
fn e2e_full_text_search_through_presentation_queue() {
    let (dispatcher, queue) = QueuedDispatcher::new();
    let ws = Workspace::new(WorkspaceOptions::default(), Arc::new(dispatcher));
    ws.open_directory(&fixtures_root()).unwrap();
    queue.pump();
    ws.select_all();
    ws.filter_service().set_filter(Filter {
        search_template: SearchTemplate::full_text("timeout"),
        ..Filter::default()
    });

    ws.load_selected();
    assert!(ws.records().is_empty());

    // Publishing the records schedules the builds; each finished build
    // re-applies the filter through the queue.
    queue.pump();
    ws.wait_for_idle();
    queue.pump();

    assert!(ws
        .selected_files()
        .iter()
        .all(|f| f.load_state() == LoadState::Loaded
            && ws.index().index_state(f.id()) == IndexState::Indexed));
    assert_eq!(
        messages(&ws.records()),
        vec![
            "Job 42 failed: timeout timeout timeout",
            "Connection timeout while contacting catalog",
        ]
    );
}

#[test]
fn e2e_full_text_query_syntax_error_yields_nothing() {
    let ws = loaded(&fixtures_root());
    assert!(search(&ws, SearchTemplate::full_text("nosuchfield:boom")).is_empty());
}

// =============================================================================
// Reload and unload
// =============================================================================

#[test]
fn e2e_reload_reindexes_new_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Svc_2024-03-10_000001_1.log");
    fs::write(
        &path,
        "2024-03-10 08:00:00:000 => [INFO] [Svc] [1] service started\n",
    )
    .unwrap();

    let ws = loaded(dir.path());
    assert!(search(&ws, SearchTemplate::full_text("quota")).is_empty());

    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("2024-03-10 08:00:05:000 => [ERROR] [Svc] [1] quota exceeded\n");
    fs::write(&path, content).unwrap();

    let file = ws.selected_files()[0].clone();
    assert_eq!(ws.loader().reload_file_node(&file), LoadState::Loaded);
    ws.wait_for_idle();
    ws.refresh();

    assert_eq!(
        messages(&ws.records()),
        vec!["quota exceeded"]
    );
}

#[test]
fn e2e_unload_removes_records_and_index() {
    let ws = loaded(&fixtures_root());
    let worker = ws
        .selected_files()
        .into_iter()
        .find(|f| f.display_name().starts_with("Worker"))
        .unwrap();

    ws.loader().unload_file_node(&worker);

    assert_eq!(worker.load_state(), LoadState::Unloaded);
    assert_eq!(ws.index().index_state(worker.id()), IndexState::NoIndex);
    assert_eq!(ws.records().len(), 7);
    assert!(ws.records().iter().all(|r| !r.message.contains("Worker")));
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn e2e_export_filtered_table_as_csv() {
    let ws = loaded(&fixtures_root());
    ws.set_filter(Filter::with_event_kinds(&[EventKind::Error]));

    let mut out = Vec::new();
    let rows = export::export_csv(&ws.records(), &mut out).unwrap();
    assert_eq!(rows, 2);

    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,event,file,line,source,thread,message")
    );
    assert!(text.contains("2024-03-11 22:00:10.000,Error,"));
    assert!(text.contains("Job 42 failed: timeout timeout timeout"));
}
