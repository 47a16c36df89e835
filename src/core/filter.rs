// logsieve - core/filter.rs
//
// Declarative filter model: file-level and record-level predicates plus the
// search template. All active predicates are AND-combined.
// Core layer: pure logic, no I/O.

use crate::core::model::{EventKind, LogRecord};
use crate::core::tree::FileNode;
use crate::util::constants;
use crate::util::error::FilterError;
use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Text to look for in record messages and how to look for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTemplate {
    /// Search text. Empty means "no text predicate".
    pub template_string: String,

    /// Route the search through the per-file full-text index and rank the
    /// results by relevance instead of substring-matching messages.
    pub use_full_text_search: bool,

    /// Substring matching respects case.
    pub match_case: bool,

    /// Substring matching only accepts whole words.
    pub match_whole_word: bool,
}

impl SearchTemplate {
    /// Plain substring search.
    pub fn substring(text: impl Into<String>) -> Self {
        Self {
            template_string: text.into(),
            ..Default::default()
        }
    }

    /// Ranked full-text search.
    pub fn full_text(text: impl Into<String>) -> Self {
        Self {
            template_string: text.into(),
            use_full_text_search: true,
            ..Default::default()
        }
    }

    /// True when a filter pass must go through the full-text index.
    pub fn is_full_text_active(&self) -> bool {
        self.use_full_text_search && !self.template_string.is_empty()
    }
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Complete filter state.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Event kinds to include (empty = all).
    pub event_kinds: HashSet<EventKind>,

    /// Files whose name-derived date falls outside this range are rejected.
    /// Files without a date always pass.
    pub date_range: Option<DateRange>,

    pub search_template: SearchTemplate,
}

impl Filter {
    /// Returns true if no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.event_kinds.is_empty()
            && self.date_range.is_none()
            && self.search_template.template_string.is_empty()
    }

    /// Filter that keeps only the given event kinds.
    pub fn with_event_kinds(kinds: &[EventKind]) -> Self {
        Self {
            event_kinds: kinds.iter().copied().collect(),
            ..Default::default()
        }
    }

    /// File-level predicate.
    pub fn accepts_file(&self, file: &FileNode) -> bool {
        match (self.date_range, file.file_date()) {
            (Some(range), Some(date)) => range.contains(date),
            _ => true,
        }
    }

    /// Record-level event kind predicate.
    pub fn accepts_event_kind(&self, kind: EventKind) -> bool {
        self.event_kinds.is_empty() || self.event_kinds.contains(&kind)
    }

    /// Compile the message predicate for the field-only path.
    pub fn message_matcher(&self) -> Result<MessageMatcher, FilterError> {
        MessageMatcher::compile(&self.search_template)
    }

    /// Full record-level predicate for the field-only path.
    pub fn accepts_record(&self, record: &LogRecord, matcher: &MessageMatcher) -> bool {
        self.accepts_event_kind(record.event_kind) && matcher.is_match(&record.message)
    }
}

/// Compiled message predicate of a search template.
#[derive(Debug, Clone)]
pub enum MessageMatcher {
    /// Empty template: every message matches.
    Any,
    /// Case-sensitive substring.
    Contains(String),
    /// Case-insensitive or whole-word match.
    Pattern(Regex),
}

impl MessageMatcher {
    pub fn compile(template: &SearchTemplate) -> Result<Self, FilterError> {
        let text = &template.template_string;
        if text.is_empty() {
            return Ok(Self::Any);
        }
        if text.len() > constants::MAX_TEMPLATE_LENGTH {
            return Err(FilterError::TemplateTooLong {
                length: text.len(),
                max_length: constants::MAX_TEMPLATE_LENGTH,
            });
        }
        if template.match_case && !template.match_whole_word {
            return Ok(Self::Contains(text.clone()));
        }

        let escaped = regex::escape(text);
        let pattern = if template.match_whole_word {
            format!(r"\b{escaped}\b")
        } else {
            escaped
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(!template.match_case)
            .build()
            .map(Self::Pattern)
            .map_err(|e| FilterError::InvalidPattern {
                template: text.clone(),
                source: e,
            })
    }

    pub fn is_match(&self, message: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Contains(needle) => message.contains(needle.as_str()),
            Self::Pattern(re) => re.is_match(message),
        }
    }
}
