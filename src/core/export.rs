// logsieve - core/export.rs
//
// CSV and JSON export of a record table.
// Core layer: writes to any Write trait object.

use crate::core::model::LogRecord;
use crate::util::error::ExportError;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Flat, serialisable view of one record.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub timestamp: String,
    pub event: &'a str,
    pub file: String,
    pub line: u64,
    pub source: &'a str,
    pub thread: &'a str,
    pub message: &'a str,
}

impl<'a> ExportRow<'a> {
    pub fn from_record(record: &'a LogRecord) -> Self {
        Self {
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            event: record.event_kind.label(),
            file: record
                .file()
                .map(|f| f.path().display().to_string())
                .unwrap_or_default(),
            line: record.line_number,
            source: record.source.as_deref().unwrap_or(""),
            thread: record.thread.as_deref().unwrap_or(""),
            message: &record.message,
        }
    }
}

/// Export records as CSV with a header row. Returns the number of rows.
pub fn export_csv<W: Write>(records: &[Arc<LogRecord>], writer: W) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer
            .serialize(ExportRow::from_record(record))
            .map_err(|e| ExportError::Csv { source: e })?;
    }
    csv_writer
        .flush()
        .map_err(|e| ExportError::Io { source: e })?;
    Ok(records.len())
}

/// Export records as a pretty-printed JSON array. Returns the number of rows.
pub fn export_json<W: Write>(records: &[Arc<LogRecord>], writer: W) -> Result<usize, ExportError> {
    let rows: Vec<ExportRow<'_>> = records.iter().map(|r| ExportRow::from_record(r)).collect();
    serde_json::to_writer_pretty(writer, &rows).map_err(|e| ExportError::Json { source: e })?;
    Ok(rows.len())
}
