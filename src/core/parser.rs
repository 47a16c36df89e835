// logsieve - core/parser.rs
//
// Line-oriented record parsing.
// Core layer: accepts file content as text, never touches the filesystem.
//
// A line matching the record pattern starts a new record; any other line is
// appended to the previous record's message. Records keep source order and
// their timestamps are taken as written (no monotonic clamping).

use crate::core::model::{EventKind, LogRecord};
use crate::core::tree::FileNode;
use crate::util::constants;
use crate::util::error::ParseError;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Configuration for parsing operations.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Record-start pattern. Must provide the `timestamp`, `level` and
    /// `message` named groups; `source` and `thread` are optional.
    pub line_pattern: Regex,
    pub max_entry_size: usize,
    pub max_parse_errors_per_file: usize,
}

impl ParseConfig {
    pub fn with_pattern(line_pattern: Regex) -> Self {
        Self {
            line_pattern,
            ..Self::default()
        }
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            line_pattern: default_line_pattern().clone(),
            max_entry_size: constants::DEFAULT_MAX_ENTRY_SIZE,
            max_parse_errors_per_file: constants::MAX_PARSE_ERRORS_PER_FILE,
        }
    }
}

fn default_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(constants::DEFAULT_LINE_PATTERN).expect("default line pattern: invalid regex")
    })
}

/// Result of parsing a single log file.
#[derive(Debug)]
pub struct ParseResult {
    /// Parsed records in source order.
    pub records: Vec<LogRecord>,
    /// Parse errors encountered (capped at max_parse_errors_per_file).
    pub errors: Vec<ParseError>,
    /// Total lines processed.
    pub lines_processed: u64,
}

/// Parse `content` into records owned by `file`.
pub fn parse_content(content: &str, file: &Arc<FileNode>, config: &ParseConfig) -> ParseResult {
    let mut records: Vec<LogRecord> = Vec::new();
    let mut errors = Vec::new();
    let mut lines_processed: u64 = 0;

    let push_error = |errors: &mut Vec<ParseError>, error: ParseError| {
        if errors.len() < config.max_parse_errors_per_file {
            errors.push(error);
        }
    };

    for (line_idx, raw_line) in content.lines().enumerate() {
        lines_processed += 1;
        let line_number = (line_idx as u64) + 1;
        let line = raw_line.trim_end_matches('\r');

        if line.trim().is_empty() {
            continue;
        }

        let started = match config.line_pattern.captures(line) {
            Some(caps) => {
                let raw_ts = caps.name("timestamp").map(|m| m.as_str()).unwrap_or_default();
                match parse_timestamp(raw_ts) {
                    Some(timestamp) => {
                        let event_kind = caps
                            .name("level")
                            .and_then(|m| EventKind::from_label(m.as_str()))
                            .unwrap_or_default();
                        let message = caps
                            .name("message")
                            .map(|m| m.as_str())
                            .unwrap_or(line);
                        let source = non_empty(caps.name("source").map(|m| m.as_str()));
                        let thread = non_empty(caps.name("thread").map(|m| m.as_str()));
                        records.push(
                            LogRecord::new(file, line_number, timestamp, event_kind, message)
                                .with_source(source, thread),
                        );
                        true
                    }
                    None => {
                        push_error(
                            &mut errors,
                            ParseError::TimestampParse {
                                file: file.path().to_path_buf(),
                                line_number,
                                raw_timestamp: raw_ts.to_string(),
                            },
                        );
                        false
                    }
                }
            }
            None => false,
        };

        if !started {
            match records.last_mut() {
                Some(last) => {
                    // Stop growing once truncated.
                    if last.message.len() <= config.max_entry_size {
                        last.message.push('\n');
                        last.message.push_str(line);
                    }
                }
                None => push_error(
                    &mut errors,
                    ParseError::LineParse {
                        file: file.path().to_path_buf(),
                        line_number,
                        reason: "Line does not start a record and no record precedes it"
                            .to_string(),
                    },
                ),
            }
        }

        if let Some(last) = records.last_mut() {
            truncate_message(&mut last.message, config.max_entry_size);
        }
    }

    tracing::debug!(
        file = %file.path().display(),
        records = records.len(),
        errors = errors.len(),
        lines = lines_processed,
        "Parsing complete"
    );

    ParseResult {
        records,
        errors,
        lines_processed,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn truncate_message(message: &mut String, max: usize) {
    if message.len() <= max {
        return;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    message.push_str(constants::TRUNCATION_MARKER);
}

/// Parse a record timestamp such as `2024-03-10 08:15:02:117`.
///
/// The fractional separator may be `:`, `.` or `,` and the date/time
/// separator may be a space or `T`. The value is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if !raw.is_ascii() || raw.len() < 19 {
        return None;
    }

    let mut normalised = String::with_capacity(raw.len());
    normalised.push_str(&raw[..10]);
    normalised.push(' ');
    normalised.push_str(&raw[11..19]);
    if raw.len() > 19 {
        normalised.push('.');
        normalised.push_str(&raw[20..]);
    }

    NaiveDateTime::parse_from_str(&normalised, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&normalised, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}
