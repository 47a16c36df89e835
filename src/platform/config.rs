// logsieve - platform/config.rs
//
// Platform-specific directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Resolved platform paths for logsieve configuration and data.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logsieve/ or %APPDATA%\logsieve\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                "Platform paths resolved"
            );

            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file can be used with
/// an older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub discovery: DiscoverySection,
    pub parsing: ParsingSection,
    pub index: IndexSection,
    pub logging: LoggingSection,
}

/// `[discovery]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub max_depth: Option<usize>,
    pub max_files: Option<usize>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[parsing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ParsingSection {
    /// Maximum single record size in bytes.
    pub max_entry_size_bytes: Option<usize>,
    /// Files at or above this size are memory-mapped.
    pub large_file_threshold_bytes: Option<u64>,
    /// Record-start regex with named groups.
    pub line_pattern: Option<String>,
}

/// `[index]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct IndexSection {
    /// Writer arena for one file's index build.
    pub writer_memory_bytes: Option<usize>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Discovery --
    pub max_depth: usize,
    pub max_files: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,

    // -- Parsing --
    pub max_entry_size: usize,
    pub large_file_threshold: u64,
    /// Custom record-start pattern; `None` uses the built-in line format.
    pub line_pattern: Option<String>,

    // -- Index --
    pub index_writer_memory: usize,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::DEFAULT_MAX_FILES,
            include_patterns: to_strings(constants::DEFAULT_INCLUDE_PATTERNS),
            exclude_patterns: to_strings(constants::DEFAULT_EXCLUDE_PATTERNS),
            max_entry_size: constants::DEFAULT_MAX_ENTRY_SIZE,
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
            line_pattern: None,
            index_writer_memory: constants::DEFAULT_INDEX_WRITER_MEMORY,
            log_level: None,
            log_file: None,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

/// Load and validate `config.toml` from the given config directory.
///
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults with a warning.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => {
            tracing::info!(path = %config_path.display(), "Loading config.toml");
            parse_config(&content)
        }
        Err(source) => {
            let err = ConfigError::Io {
                path: config_path.clone(),
                source,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

/// Parse and validate config.toml content.
pub fn parse_config(content: &str) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let raw: RawConfig = match toml::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("Failed to parse config: {e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let mut config = AppConfig::default();

    // -- Discovery --
    config.max_depth = checked(
        "[discovery] max_depth",
        raw.discovery.max_depth,
        1..=constants::ABSOLUTE_MAX_DEPTH,
        config.max_depth,
        &mut warnings,
    );
    config.max_files = checked(
        "[discovery] max_files",
        raw.discovery.max_files,
        constants::MIN_MAX_FILES..=constants::ABSOLUTE_MAX_FILES,
        config.max_files,
        &mut warnings,
    );

    if let Some(patterns) = raw.discovery.include_patterns {
        config.include_patterns = valid_globs(patterns, "include_patterns", &mut warnings);
    }
    if let Some(patterns) = raw.discovery.exclude_patterns {
        config.exclude_patterns = valid_globs(patterns, "exclude_patterns", &mut warnings);
    }

    // -- Parsing --
    config.max_entry_size = checked(
        "[parsing] max_entry_size_bytes",
        raw.parsing.max_entry_size_bytes,
        1..=constants::ABSOLUTE_MAX_ENTRY_SIZE,
        config.max_entry_size,
        &mut warnings,
    );

    if let Some(threshold) = raw.parsing.large_file_threshold_bytes {
        config.large_file_threshold = threshold;
    }

    if let Some(pattern) = raw.parsing.line_pattern {
        match validate_line_pattern(&pattern) {
            Ok(()) => config.line_pattern = Some(pattern),
            Err(reason) => warnings.push(format!(
                "[parsing] line_pattern is invalid: {reason}. Using the built-in format."
            )),
        }
    }

    // -- Index --
    // tantivy rejects writer arenas below its per-thread minimum.
    config.index_writer_memory = checked(
        "[index] writer_memory_bytes",
        raw.index.writer_memory_bytes,
        constants::MIN_INDEX_WRITER_MEMORY..=constants::MAX_INDEX_WRITER_MEMORY,
        config.index_writer_memory,
        &mut warnings,
    );

    // -- Logging --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    if let Some(file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file);
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

/// `value` if it lies in `range`, otherwise `default` plus a warning.
fn checked<T>(
    key: &str,
    value: Option<T>,
    range: RangeInclusive<T>,
    default: T,
    warnings: &mut Vec<String>,
) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    match value {
        Some(v) if range.contains(&v) => v,
        Some(v) => {
            warnings.push(format!(
                "{key} = {v} is out of range ({}-{}). Using default ({default}).",
                range.start(),
                range.end(),
            ));
            default
        }
        None => default,
    }
}

fn valid_globs(patterns: Vec<String>, key: &str, warnings: &mut Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .filter(|p| match glob::Pattern::new(p) {
            Ok(_) => true,
            Err(e) => {
                warnings.push(format!(
                    "[discovery] {key}: pattern \"{p}\" is invalid ({e}) and was dropped."
                ));
                false
            }
        })
        .collect()
}

/// A custom line pattern must compile, stay within the length limit and
/// provide every required named group.
fn validate_line_pattern(pattern: &str) -> Result<(), String> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(format!(
            "pattern is {} chars, exceeds maximum of {}",
            pattern.len(),
            constants::MAX_REGEX_PATTERN_LENGTH
        ));
    }
    let re = regex::Regex::new(pattern).map_err(|e| e.to_string())?;
    let missing: Vec<&str> = constants::REQUIRED_LINE_PATTERN_GROUPS
        .iter()
        .copied()
        .filter(|group| !re.capture_names().flatten().any(|n| n == *group))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing named group(s): {}", missing.join(", ")))
    }
}
