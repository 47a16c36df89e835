// logsieve - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "logsieve";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "logsieve";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Discovery limits
// =============================================================================

/// Maximum directory recursion depth during discovery.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Minimum sensible value for the max-files limit (controls must be non-zero).
pub const MIN_MAX_FILES: usize = 1;

/// Maximum number of files to discover in a single scan.
pub const DEFAULT_MAX_FILES: usize = 500;

/// Hard upper bound on max files (prevents configuration mistakes).
pub const ABSOLUTE_MAX_FILES: usize = 10_000;

/// Hard upper bound on max depth (prevents infinite traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Default include glob patterns for log file discovery.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.log", "*.log.[0-9]*"];

/// Default exclude glob patterns for log file discovery.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "*.gz",
    "*.zip",
    "*.bak",
    "*.tmp",
    "node_modules",
    ".git",
];

// =============================================================================
// File naming
// =============================================================================

/// Filename convention for "unify-named" files:
/// `<letters-and-dots>_<yyyy-MM-dd>_<6 digits>_<digits>.log`.
/// The first capture group is the embedded date.
pub const UNIFY_NAME_PATTERN: &str = r"^[a-zA-Z\.]+_(\d{4}-\d{2}-\d{2})_\d{6}_\d+\.log$";

/// chrono format of the date embedded in a unify-named file.
pub const UNIFY_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Parsing limits
// =============================================================================

/// Default record line layout:
/// `2024-03-10 08:15:02:117 => [ERROR] [App.Services.Sync] [12] message`.
/// Source and thread columns are optional.
pub const DEFAULT_LINE_PATTERN: &str = r"^(?P<timestamp>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[:.,]\d{1,6})?)\s+=>\s+\[(?P<level>[A-Za-z]+)\]\s*(?:\[(?P<source>[^\]]*)\]\s*)?(?:\[(?P<thread>\d+)\]\s*)?(?P<message>.*)$";

/// Named capture groups a custom line pattern must provide.
pub const REQUIRED_LINE_PATTERN_GROUPS: &[&str] = &["timestamp", "level", "message"];

/// Maximum size of a single record message in bytes. Messages exceeding
/// this are truncated to prevent unbounded memory from malformed files.
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 64 * 1024; // 64 KB

/// Hard upper bound on the configurable entry size.
pub const ABSOLUTE_MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// File size threshold in bytes above which files are memory-mapped.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MB

/// Maximum number of parse errors tracked per file before suppression.
pub const MAX_PARSE_ERRORS_PER_FILE: usize = 1_000;

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Suffix appended to truncated messages.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

// =============================================================================
// I/O retry
// =============================================================================

/// Retry limit for transient I/O errors.
pub const MAX_READ_RETRIES: u32 = 3;

/// Backoff between transient I/O retries (ms).
pub const READ_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

// =============================================================================
// Full-text index
// =============================================================================

/// Writer arena size for building one file's index.
pub const DEFAULT_INDEX_WRITER_MEMORY: usize = 20_000_000;

/// tantivy refuses writer arenas below 15 MB per indexing thread.
pub const MIN_INDEX_WRITER_MEMORY: usize = 15_000_000;

/// Upper bound on the configurable writer arena.
pub const MAX_INDEX_WRITER_MEMORY: usize = 1_000_000_000;

/// Name of the indexed message field.
pub const INDEX_FIELD_MESSAGE: &str = "message";

/// Name of the stored record ordinal field.
pub const INDEX_FIELD_ORDINAL: &str = "ordinal";

// =============================================================================
// Filtering
// =============================================================================

/// Longest accepted search template. Longer input is treated as a
/// predicate error and matches nothing.
pub const MAX_TEMPLATE_LENGTH: usize = 1_024;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a message preview included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
