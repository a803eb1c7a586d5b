//! # seclog-core
//!
//! Security log lifecycle engine: reads append-only daily log files,
//! compacts past months into compressed monthly archives, and serves
//! paginated views over both.
//!
//! This crate provides:
//!
//! - [`LogParser`] - Turns raw lines into [`LogRecord`]s
//! - [`ActiveLogReader`] - Paginated view over unarchived daily files
//! - [`ArchiveCompactor`] - Moves past-month files into monthly archives
//! - [`ArchiveReader`] - Paginated view over one archive, plus listing
//! - [`ArchiveLocks`] - Per-archive writer exclusion
//! - [`SecurityLogService`] - The operation surface for callers
//! - [`RetentionScheduler`] - Periodic archival
//! - [`DailyLogWriter`] - Writes files in the daily layout
//!
//! ## Layout
//!
//! ```text
//! <log-root>/security-YYYY-MM-DD.log
//! <log-root>/archived/security-logs-YYYY-MM.zip
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use seclog_core::{EngineConfig, SecurityLogService};
//!
//! # fn main() -> seclog_core::Result<()> {
//! let service = SecurityLogService::new(EngineConfig::new("/var/www/storage/logs"))?;
//!
//! let report = service.archive_now();
//! println!("archived {} file(s)", report.archived.len());
//!
//! let page = service.get_archive_page("security-logs-2025-01.zip", 1, 25)?;
//! for record in page.data {
//!     println!("{} {} {}", record.datetime, record.level, record.message);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod active;
pub mod archive;
pub mod compactor;
pub mod config;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod naming;
pub mod parser;
pub mod scheduler;
pub mod service;
pub mod types;
pub mod writer;

// Re-export main types
pub use active::{ActiveLogReader, DailyFile};
pub use archive::ArchiveReader;
pub use compactor::ArchiveCompactor;
pub use config::EngineConfig;
pub use error::{LogError, Result};
pub use lock::{ArchiveLockGuard, ArchiveLocks, LockConfig};
pub use manifest::{Manifest, ManifestEntry};
pub use naming::{ArchiveId, DailyFileName, MonthKey};
pub use parser::LogParser;
pub use scheduler::{RetentionScheduler, SchedulerHandle};
pub use service::SecurityLogService;
pub use types::{
    ArchiveMetadata, ArchiveReport, ArchivedFile, LogLevel, LogRecord, PageRequest,
    PaginatedResult, RecordId, Statistics,
};
pub use writer::{DailyLogWriter, NewEntry};
