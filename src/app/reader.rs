// logsieve - app/reader.rs
//
// Raw record reader: file on disk -> parsed records.

use crate::core::model::LogRecord;
use crate::core::parser::{self, ParseConfig};
use crate::core::tree::FileNode;
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::LoadError;
use std::sync::Arc;

/// Produces the ordered records of a file.
pub trait RecordReader: Send + Sync {
    fn load_records_from_file(&self, file: &Arc<FileNode>) -> Result<Vec<LogRecord>, LoadError>;
}

/// Reads files from disk and parses them with a line pattern.
#[derive(Debug, Clone)]
pub struct LogFileReader {
    parse_config: ParseConfig,
    large_file_threshold: u64,
}

impl LogFileReader {
    pub fn new(parse_config: ParseConfig, large_file_threshold: u64) -> Self {
        Self {
            parse_config,
            large_file_threshold,
        }
    }
}

impl Default for LogFileReader {
    fn default() -> Self {
        Self::new(ParseConfig::default(), constants::DEFAULT_LARGE_FILE_THRESHOLD)
    }
}

impl RecordReader for LogFileReader {
    fn load_records_from_file(&self, file: &Arc<FileNode>) -> Result<Vec<LogRecord>, LoadError> {
        let content = fs::read_file_content(file.path(), self.large_file_threshold)?;
        let result = parser::parse_content(&content, file, &self.parse_config);

        if !result.errors.is_empty() {
            tracing::debug!(
                file = %file.path().display(),
                errors = result.errors.len(),
                first = %result.errors[0],
                "Parse errors (non-fatal)"
            );
        }

        Ok(result.records)
    }
}
