// logsieve - core/discovery.rs
//
// Recursive directory traversal building the browsed DirectoryNode tree.
//
// Uses `walkdir` for traversal. Reads directory entries only, never file
// contents; records are loaded later by the app layer.
//
// Per-entry I/O errors are non-fatal and collected as warnings. Exclude
// patterns short-circuit directory descent via filter_entry so excluded
// subtrees (e.g. node_modules/) are never traversed at all.

use crate::core::tree::{DirectoryNode, FileNode};
use crate::util::constants;
use crate::util::error::DiscoveryError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a discovery operation.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    /// Maximum number of files to attach to the tree.
    pub max_files: usize,

    /// Glob patterns (filename-only) that a file MUST match to be included.
    /// An empty list means "include everything that is not excluded".
    pub include_patterns: Vec<String>,

    /// Glob patterns matched against filenames AND directory component names.
    /// Matching files are skipped; matching directories are not descended into.
    pub exclude_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::DEFAULT_MAX_FILES,
            include_patterns: constants::DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            exclude_patterns: constants::DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Walk `root` and build its directory tree.
///
/// Entries are visited in file-name order so the tree layout is stable.
/// Directories that contain no accepted file are still attached; their
/// visibility is derived later by `DirectoryNode::update_visibility`.
///
/// # Non-fatal errors
/// Inaccessible entries and the max-files cut-off are reported as
/// human-readable strings in the returned warnings vector.
///
/// # Fatal errors
/// Returns `Err` only if the root path is invalid.
pub fn discover_tree(
    root: &Path,
    config: &DiscoveryConfig,
) -> Result<(Arc<DirectoryNode>, Vec<String>), DiscoveryError> {
    preflight(root)?;

    let max_files = config.max_files.clamp(constants::MIN_MAX_FILES, constants::ABSOLUTE_MAX_FILES);
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        max_files,
        include = ?config.include_patterns,
        exclude = ?config.exclude_patterns,
        "Discovery starting"
    );

    let patterns = PatternSet::compile(config);

    let root_node = Arc::new(DirectoryNode::new(root));
    let mut directories: HashMap<PathBuf, Arc<DirectoryNode>> = HashMap::new();
    directories.insert(root.to_path_buf(), Arc::clone(&root_node));

    let mut warnings: Vec<String> = Vec::new();
    let mut accepted = 0usize;
    let mut skipped_over_limit = 0usize;

    let walker = walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            !e.file_name()
                .to_str()
                .is_some_and(|name| patterns.prunes_directory(name))
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        let Some(parent) = path.parent().and_then(|p| directories.get(p)).cloned() else {
            // Parent was skipped (excluded or unreadable).
            continue;
        };

        if entry.file_type().is_dir() {
            let node = Arc::new(DirectoryNode::new(path));
            parent.add_directory(Arc::clone(&node));
            directories.insert(path.to_path_buf(), node);
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            warnings.push(format!("Skipping '{}': file name is not UTF-8", path.display()));
            continue;
        };

        if !patterns.accepts_file(file_name) {
            tracing::trace!(file = file_name, "Filtered out by patterns");
            continue;
        }

        if accepted >= max_files {
            skipped_over_limit += 1;
            continue;
        }

        match FileNode::from_path(path) {
            Ok(node) => {
                parent.add_file(Arc::new(node));
                accepted += 1;
            }
            Err(e) => {
                let msg = format!("Skipping '{}': {e}", path.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
            }
        }
    }

    if skipped_over_limit > 0 {
        let total_found = accepted + skipped_over_limit;
        warnings.push(format!(
            "{total_found} log files were found but the limit is {max_files}. \
             Only the first {max_files} have been added."
        ));
        tracing::info!(
            total_found,
            limit = max_files,
            "File tree truncated at the file limit"
        );
    }

    tracing::debug!(
        files = accepted,
        directories = directories.len(),
        warnings = warnings.len(),
        "Discovery complete"
    );

    Ok((root_node, warnings))
}

/// Check that `root` exists and is a readable directory.
///
/// Uses `fs::metadata()` rather than `Path::is_dir()` because the latter maps
/// every error (including PermissionDenied) to `false`.
fn preflight(root: &Path) -> Result<(), DiscoveryError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DiscoveryError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => Err(DiscoveryError::RootNotFound {
            path: root.to_path_buf(),
        }),
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Compiled include and exclude globs of one discovery run.
struct PatternSet {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl PatternSet {
    fn compile(config: &DiscoveryConfig) -> Self {
        Self {
            include: compile_globs(&config.include_patterns, "include"),
            exclude: compile_globs(&config.exclude_patterns, "exclude"),
        }
    }

    /// Directories are pruned only by literal exclude patterns such as
    /// `node_modules`; wildcard patterns apply to file names.
    fn prunes_directory(&self, dir_name: &str) -> bool {
        self.exclude.iter().any(|p| {
            let literal = !p.as_str().contains(['*', '?', '[']);
            literal && p.matches(dir_name)
        })
    }

    /// Not excluded, and included (an empty include list includes all).
    fn accepts_file(&self, file_name: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(file_name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(file_name))
    }
}

fn compile_globs(patterns: &[String], kind: &str) -> Vec<glob::Pattern> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for raw in patterns {
        match glob::Pattern::new(raw) {
            Ok(p) => compiled.push(p),
            Err(e) => tracing::warn!(pattern = %raw, kind, error = %e, "Glob pattern ignored"),
        }
    }
    compiled
}
