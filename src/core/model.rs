// logsieve - core/model.rs
//
// Core data model types shared across all layers.

use crate::core::tree::FileNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// =============================================================================
// Event kind
// =============================================================================

/// Kind of event a record describes, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum EventKind {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Status,
}

impl EventKind {
    /// Returns all variants in display order.
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::Debug,
            EventKind::Info,
            EventKind::Warning,
            EventKind::Error,
            EventKind::Status,
        ]
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Debug => "Debug",
            EventKind::Info => "Info",
            EventKind::Warning => "Warning",
            EventKind::Error => "Error",
            EventKind::Status => "Status",
        }
    }

    /// Map a level label from a log line (case-insensitive).
    /// Returns `None` for labels that are not recognised.
    pub fn from_label(raw: &str) -> Option<EventKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" | "dbg" | "trace" | "verbose" => Some(EventKind::Debug),
            "info" | "information" => Some(EventKind::Info),
            "warning" | "warn" => Some(EventKind::Warning),
            "error" | "err" | "fatal" | "critical" => Some(EventKind::Error),
            "status" => Some(EventKind::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Log record
// =============================================================================

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// A single parsed record. Immutable once created; shared as `Arc<LogRecord>`
/// between its file, the displayed table and the full-text index.
#[derive(Debug)]
pub struct LogRecord {
    /// Process-wide unique identity. Two loads of the same line yield
    /// different ids.
    pub id: u64,

    /// Timestamp of the line that started the record (UTC).
    pub timestamp: DateTime<Utc>,

    /// Normalised event kind.
    pub event_kind: EventKind,

    /// Optional source/type column.
    pub source: Option<String>,

    /// Optional thread column.
    pub thread: Option<String>,

    /// Line number in the source file where this record begins.
    pub line_number: u64,

    /// Full message text, including continuation lines.
    pub message: String,

    /// Owning file. Non-owning so records never keep a removed file alive.
    file: Weak<FileNode>,
}

impl LogRecord {
    pub fn new(
        file: &Arc<FileNode>,
        line_number: u64,
        timestamp: DateTime<Utc>,
        event_kind: EventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
            timestamp,
            event_kind,
            source: None,
            thread: None,
            line_number,
            message: message.into(),
            file: Arc::downgrade(file),
        }
    }

    pub fn with_source(mut self, source: Option<String>, thread: Option<String>) -> Self {
        self.source = source;
        self.thread = thread;
        self
    }

    /// The file this record was parsed from, if it is still alive.
    pub fn file(&self) -> Option<Arc<FileNode>> {
        self.file.upgrade()
    }
}

/// A record paired with its relevance score for the duration of a query.
/// Lower scores are more relevant.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub record: Arc<LogRecord>,
    pub score: f32,
}

// =============================================================================
// Lifecycle states
// =============================================================================

/// Load lifecycle of a file node. A failed load falls back to the state the
/// node was in before the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

/// Full-text index lifecycle of a file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NoIndex,
    Building,
    Indexed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_label_is_case_insensitive() {
        assert_eq!(EventKind::from_label("ERROR"), Some(EventKind::Error));
        assert_eq!(EventKind::from_label("Warn"), Some(EventKind::Warning));
        assert_eq!(EventKind::from_label(" debug "), Some(EventKind::Debug));
        assert_eq!(EventKind::from_label("STATUS"), Some(EventKind::Status));
        assert_eq!(EventKind::from_label("noise"), None);
    }

    #[test]
    fn test_record_ids_are_unique() {
        let file = Arc::new(FileNode::from_path("ids.log").unwrap());
        let a = LogRecord::new(&file, 1, Utc::now(), EventKind::Info, "a");
        let b = LogRecord::new(&file, 1, Utc::now(), EventKind::Info, "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_back_reference_does_not_own_file() {
        let file = Arc::new(FileNode::from_path("owner.log").unwrap());
        let record = LogRecord::new(&file, 1, Utc::now(), EventKind::Info, "x");
        assert!(record.file().is_some());
        drop(file);
        assert!(record.file().is_none());
    }
}
