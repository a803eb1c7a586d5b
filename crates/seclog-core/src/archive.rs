//! Reading and listing of monthly archives.
//!
//! Archives are read whole on every request: entries are decompressed into
//! memory, never onto disk. Archive reads are a cold path, so nothing is
//! cached between calls.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::active::sort_newest_first;
use crate::error::{LogError, Result};
use crate::naming::{ArchiveId, DailyFileName};
use crate::parser::LogParser;
use crate::types::{ArchiveMetadata, LogRecord, PageRequest, PaginatedResult};

/// Reader over the archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    archive_dir: PathBuf,
    parser: LogParser,
}

impl ArchiveReader {
    /// Creates a reader over `archive_dir`.
    #[must_use]
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            parser: LogParser::new(),
        }
    }

    /// Parses every record in an archive, newest first.
    ///
    /// Only entries named like daily files are read; anything else in the
    /// container is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ArchiveNotFound`] if the archive does not exist
    /// and [`LogError::ArchiveOpen`] if it is not a readable container.
    pub fn read_all(&self, id: &ArchiveId) -> Result<Vec<LogRecord>> {
        let path = self.archive_dir.join(id.as_str());
        let file = match File::open(&path) {
            Ok(file) if file.metadata().is_ok_and(|m| m.is_file()) => file,
            Ok(_) => return Err(LogError::ArchiveNotFound(id.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LogError::ArchiveNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let open_failed = |reason: String| LogError::ArchiveOpen {
            archive: id.to_string(),
            reason,
        };
        let mut archive = ZipArchive::new(file).map_err(|e| open_failed(e.to_string()))?;

        let mut records = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| open_failed(e.to_string()))?;
            if entry.is_dir() || DailyFileName::parse(entry.name()).is_none() {
                debug!(archive = %id, entry = entry.name(), "skipping foreign archive entry");
                continue;
            }

            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| open_failed(format!("{}: {e}", entry.name())))?;
            records.extend(self.parser.parse_content(&String::from_utf8_lossy(&bytes)));
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Returns one page of an archive's records, newest first, tagged with
    /// the archive id.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidPage`] for a zero page or page size, and
    /// the errors of [`ArchiveReader::read_all`].
    pub fn read_archive_page(
        &self,
        id: &ArchiveId,
        per_page: usize,
        page: usize,
    ) -> Result<PaginatedResult<LogRecord>> {
        let request = PageRequest::new(per_page, page)?;
        let records = self.read_all(id)?;
        Ok(PaginatedResult::paginate(records, request).with_archive(id.as_str()))
    }

    /// Lists the archives on disk, newest first.
    ///
    /// Files that do not follow the archive naming convention (lock files,
    /// staging copies, the manifest) are not listed.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive directory exists but cannot be read.
    pub fn list_archives(&self) -> Result<Vec<ArchiveMetadata>> {
        let entries = match fs::read_dir(&self.archive_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut archives: Vec<ArchiveMetadata> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                ArchiveId::parse(&name).ok()?;
                let meta = match entry.metadata() {
                    Ok(meta) if meta.is_file() => meta,
                    Ok(_) => return None,
                    Err(e) => {
                        warn!(archive = %name, error = %e, "cannot stat archive");
                        return None;
                    }
                };
                let created = meta.created().or_else(|_| meta.modified()).ok()?;
                Some(ArchiveMetadata {
                    name,
                    size: meta.len(),
                    created_at: DateTime::<Utc>::from(created),
                })
            })
            .collect();

        archives.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(archives)
    }
}
