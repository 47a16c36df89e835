// logsieve - platform/fs.rs
//
// Log file reading.
//
// Large files are memory-mapped to avoid an extra heap copy of the raw
// bytes; small files are read whole with retries on transient I/O errors.

use crate::util::constants;
use crate::util::error::LoadError;
use std::io;
use std::path::Path;
use std::time::Duration;

const UTF8_BOM: &str = "\u{feff}";

/// Read the full content of a log file as UTF-8 text.
///
/// Files at or above `large_file_threshold` bytes are memory-mapped.
/// A leading byte-order mark is removed.
pub fn read_file_content(path: &Path, large_file_threshold: u64) -> Result<String, LoadError> {
    let io_err = |source: io::Error| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    let mut content = if size >= large_file_threshold {
        tracing::debug!(
            file = %path.display(),
            size_mb = size / (1024 * 1024),
            "Memory-mapping large file"
        );
        read_large_file(path)?
    } else {
        let bytes = read_with_retry(path).map_err(io_err)?;
        String::from_utf8(bytes).map_err(|e| LoadError::InvalidEncoding {
            path: path.to_path_buf(),
            source: e.utf8_error(),
        })?
    };

    if content.starts_with(UTF8_BOM) {
        content.drain(..UTF8_BOM.len());
    }
    Ok(content)
}

fn read_large_file(path: &Path) -> Result<String, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // SAFETY: the map is read-only and dropped before returning. External
    // modification of the file while mapped is accepted for already-written
    // log files.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    std::str::from_utf8(&mmap)
        .map(str::to_string)
        .map_err(|source| LoadError::InvalidEncoding {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a file with transient-error retries.
fn read_with_retry(path: &Path) -> io::Result<Vec<u8>> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..constants::MAX_READ_RETRIES {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(
                    constants::READ_RETRY_DELAYS_MS[attempt as usize],
                ));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

/// Returns true for transient I/O errors that are worth retrying.
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_small_file_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "\u{feff}line one\nline two\n").unwrap();
        let content = read_file_content(&path, u64::MAX).unwrap();
        assert_eq!(content, "line one\nline two\n");
    }

    #[test]
    fn test_large_file_path_matches_small_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        std::fs::write(&path, "mapped content\n").unwrap();
        assert_eq!(
            read_file_content(&path, 0).unwrap(),
            read_file_content(&path, u64::MAX).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_file_content(Path::new("/nonexistent/logsieve.log"), u64::MAX).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.log");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        assert!(matches!(
            read_file_content(&path, u64::MAX),
            Err(LoadError::InvalidEncoding { .. })
        ));
        assert!(matches!(
            read_file_content(&path, 0),
            Err(LoadError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_transient_error_classification() {
        assert!(is_transient_error(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient_error(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
