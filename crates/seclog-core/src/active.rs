//! Reading of the active (not yet archived) daily files.
//!
//! The sink keeps appending to today's file while this reader runs, and the
//! compactor may remove older files at any moment. A file that disappears
//! between listing and reading simply contributes no records.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::naming::DailyFileName;
use crate::parser::LogParser;
use crate::types::{LogRecord, PageRequest, PaginatedResult};

/// A daily file found in the log root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyFile {
    /// Parsed file name
    pub name: DailyFileName,
    /// Full path
    pub path: PathBuf,
}

/// Lists the daily files in `dir`, ordered by name (and thus by date).
///
/// A missing directory holds no files. Anything not following the daily
/// naming convention is ignored.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be listed.
pub fn scan_daily_files(dir: &Path) -> Result<Vec<DailyFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<DailyFile> = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| {
            let name = DailyFileName::parse(&entry.file_name().to_string_lossy())?;
            Some(DailyFile {
                name,
                path: entry.path(),
            })
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Sorts records newest first. The sort is stable, so equal timestamps
/// keep the order in which they were read.
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| b.datetime.cmp(&a.datetime));
}

/// Paginated, newest-first view over every active daily file.
#[derive(Debug, Clone)]
pub struct ActiveLogReader {
    log_root: PathBuf,
    parser: LogParser,
}

impl ActiveLogReader {
    /// Creates a reader over the daily files in `log_root`.
    #[must_use]
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            parser: LogParser::new(),
        }
    }

    /// Returns the daily files currently present.
    ///
    /// # Errors
    ///
    /// Returns an error if the log root cannot be listed.
    pub fn daily_files(&self) -> Result<Vec<DailyFile>> {
        scan_daily_files(&self.log_root)
    }

    /// Parses every active record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log root cannot be listed or a present file
    /// cannot be read.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        for file in self.daily_files()? {
            let bytes = match fs::read(&file.path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(file = %file.name, "daily file vanished before it could be read");
                    continue;
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "failed to read daily file");
                    return Err(e.into());
                }
            };
            records.extend(self.parser.parse_content(&String::from_utf8_lossy(&bytes)));
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Returns one page of active records, newest first.
    ///
    /// Pages past the end are empty but report the real totals.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LogError::InvalidPage`] for a zero page or page
    /// size, or an I/O error from reading the files.
    pub fn list_page(&self, per_page: usize, page: usize) -> Result<PaginatedResult<LogRecord>> {
        let request = PageRequest::new(per_page, page)?;
        Ok(PaginatedResult::paginate(self.read_all()?, request))
    }
}
