//! Operation surface for the calling layer.
//!
//! [`SecurityLogService`] bundles the readers and the compactor behind the
//! five operations an HTTP handler, CLI or scheduler needs. Archive ids are
//! validated before any path is built from them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::active::ActiveLogReader;
use crate::archive::ArchiveReader;
use crate::compactor::ArchiveCompactor;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::lock::ArchiveLocks;
use crate::manifest::{Manifest, ManifestEntry};
use crate::naming::ArchiveId;
use crate::types::{ArchiveMetadata, ArchiveReport, LogRecord, PaginatedResult, Statistics};

/// Security log lifecycle engine.
#[derive(Debug)]
pub struct SecurityLogService {
    config: EngineConfig,
    active: ActiveLogReader,
    archives: ArchiveReader,
    compactor: ArchiveCompactor,
    manifest: Manifest,
}

impl SecurityLogService {
    /// Creates the engine from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LogError::InvalidConfig`] if the config is inconsistent.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_locks(config.clone(), Arc::new(ArchiveLocks::new(config.lock_config())))
    }

    /// Creates the engine sharing an existing lock registry, so several
    /// engines in one process serialize on the same archives.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LogError::InvalidConfig`] if the config is inconsistent.
    pub fn with_locks(config: EngineConfig, locks: Arc<ArchiveLocks>) -> Result<Self> {
        config.validate()?;
        let archive_dir = config.archive_dir();
        let manifest = Manifest::in_dir(&archive_dir);

        let mut compactor = ArchiveCompactor::new(&config.log_root, &archive_dir, locks);
        if config.write_manifest {
            compactor = compactor.with_manifest(manifest.clone());
        }

        Ok(Self {
            active: ActiveLogReader::new(&config.log_root),
            archives: ArchiveReader::new(&archive_dir),
            compactor,
            manifest,
            config,
        })
    }

    /// One page of active records, newest first.
    ///
    /// Page sizes above the configured maximum are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LogError::InvalidPage`] for a zero page or page size,
    /// or an I/O error.
    pub fn get_active_page(&self, page: usize, per_page: usize) -> Result<PaginatedResult<LogRecord>> {
        self.active.list_page(self.clamp(per_page), page)
    }

    /// Archives on disk, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive directory cannot be read.
    pub fn get_archive_list(&self) -> Result<Vec<ArchiveMetadata>> {
        self.archives.list_archives()
    }

    /// One page of an archive's records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LogError::InvalidIdentifier`] before touching the
    /// filesystem if `archive_id` is malformed, and
    /// [`crate::LogError::ArchiveNotFound`] if it does not exist.
    pub fn get_archive_page(
        &self,
        archive_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<PaginatedResult<LogRecord>> {
        let id = ArchiveId::parse(archive_id)?;
        debug!(archive = %id, page, per_page, "reading archive page");
        self.archives.read_archive_page(&id, self.clamp(per_page), page)
    }

    /// Moves every daily file of past months into its monthly archive.
    #[must_use]
    pub fn archive_now(&self) -> ArchiveReport {
        self.compactor.archive_old_logs()
    }

    /// Like [`SecurityLogService::archive_now`], stopping between months
    /// once `cancel` fires.
    #[must_use]
    pub fn archive_now_with(&self, cancel: &CancellationToken) -> ArchiveReport {
        self.compactor
            .archive_old_logs_with(chrono::Local::now().date_naive(), cancel)
    }

    /// Like [`SecurityLogService::archive_now`], treating `today` as the
    /// current date.
    #[must_use]
    pub fn archive_as_of(&self, today: NaiveDate) -> ArchiveReport {
        self.compactor
            .archive_old_logs_with(today, &CancellationToken::new())
    }

    /// Counters over active records and archives.
    ///
    /// # Errors
    ///
    /// Returns an error if the log root or archive directory cannot be read.
    pub fn get_statistics(&self) -> Result<Statistics> {
        let active_files = self.active.daily_files()?.len();
        let records = self.active.read_all()?;
        let archives = self.archives.list_archives()?;

        let mut level_distribution = BTreeMap::new();
        for record in &records {
            *level_distribution
                .entry(record.level.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(Statistics {
            active_count: records.len(),
            active_files,
            archived_count: archives.len(),
            archived_size: archives.iter().map(|a| a.size).sum(),
            level_distribution,
        })
    }

    /// Moves recorded in the manifest, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read.
    pub fn manifest_entries(&self) -> Result<Vec<ManifestEntry>> {
        self.manifest.read_all()
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn clamp(&self, per_page: usize) -> usize {
        per_page.min(self.config.max_per_page)
    }
}
