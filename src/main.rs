// logsieve - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation
// 3. Discovery, loading and indexing of the target directory
// 4. Filtering and printing of the resulting record table

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use logsieve::app::workspace::{Workspace, WorkspaceOptions};
use logsieve::core::export::{self, ExportRow};
use logsieve::core::filter::{DateRange, Filter, SearchTemplate};
use logsieve::core::model::{EventKind, LogRecord};
use logsieve::platform::config::{self, PlatformPaths};
use logsieve::util;
use logsieve::util::error::{ExportError, LogSieveError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// logsieve - filter and search a directory tree of log files.
///
/// Every matching log file under ROOT is loaded and indexed; the records
/// that pass the filter are printed in file order, or by relevance when
/// --full-text is given.
#[derive(Parser, Debug)]
#[command(name = "logsieve", version, about)]
struct Cli {
    /// Directory to search.
    root: PathBuf,

    /// Text to look for in record messages.
    #[arg(short = 's', long = "search")]
    search: Option<String>,

    /// Rank records through the full-text index instead of substring matching.
    #[arg(short = 't', long = "full-text")]
    full_text: bool,

    /// Substring matching respects case.
    #[arg(short = 'c', long = "match-case")]
    match_case: bool,

    /// Substring matching only accepts whole words.
    #[arg(short = 'w', long = "whole-word")]
    whole_word: bool,

    /// Event kind to keep (repeatable): debug, info, warning, error, status.
    #[arg(short = 'k', long = "kind", value_parser = parse_kind)]
    kinds: Vec<EventKind>,

    /// First file date to keep (YYYY-MM-DD).
    #[arg(long = "from", value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Last file date to keep (YYYY-MM-DD).
    #[arg(long = "to", value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Output format.
    #[arg(short = 'o', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Directory containing config.toml (defaults to the platform config dir).
    #[arg(long = "config-dir")]
    config_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

fn parse_kind(raw: &str) -> Result<EventKind, String> {
    EventKind::from_label(raw).ok_or_else(|| {
        let known: Vec<_> = EventKind::all()
            .iter()
            .map(|k| k.label().to_lowercase())
            .collect();
        format!("unknown event kind '{raw}' (expected one of: {})", known.join(", "))
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{raw}': {e}"))
}

impl Cli {
    fn filter(&self) -> Filter {
        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (start, end) => Some(DateRange {
                start: start.unwrap_or(NaiveDate::MIN),
                end: end.unwrap_or(NaiveDate::MAX),
            }),
        };
        Filter {
            event_kinds: self.kinds.iter().copied().collect(),
            date_range,
            search_template: SearchTemplate {
                template_string: self.search.clone().unwrap_or_default(),
                use_full_text_search: self.full_text,
                match_case: self.match_case,
                match_whole_word: self.whole_word,
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_dir);
    let (app_config, config_warnings) = config::load_config(&config_dir);

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        root = %cli.root.display(),
        "logsieve starting"
    );

    match run(&cli, WorkspaceOptions::from_config(&app_config)) {
        Ok(count) => tracing::info!(records = count, "Done"),
        Err(e) => {
            tracing::error!(error = %e, "logsieve failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, options: WorkspaceOptions) -> Result<usize, LogSieveError> {
    let workspace = Workspace::headless(options);

    let (_, warnings) = workspace.open_directory(&cli.root)?;
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Discovery warning");
    }

    workspace.set_filter(cli.filter());
    workspace.select_all();
    workspace.load_selected();
    workspace.refresh();

    let records = workspace.records();
    let stdout = io::stdout().lock();
    let count = match cli.format {
        OutputFormat::Text => write_text(&records, stdout)?,
        OutputFormat::Csv => export::export_csv(&records, stdout)?,
        OutputFormat::Json => export::export_json(&records, stdout)?,
    };
    Ok(count)
}

fn write_text<W: Write>(records: &[Arc<LogRecord>], mut out: W) -> Result<usize, LogSieveError> {
    let io_err = |source| LogSieveError::Export(ExportError::Io { source });
    for record in records {
        let row = ExportRow::from_record(record);
        writeln!(
            out,
            "{} {:<7} {}:{} {}",
            row.timestamp, row.event, row.file, row.line, row.message
        )
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(records.len())
}
