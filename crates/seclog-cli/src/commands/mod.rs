//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`active`] - Records from unarchived daily files
//! - [`archives`] - Archive listing and archive contents
//! - [`archive_now`] - One compaction run
//! - [`stats`] - Counters
//! - [`write`] - Append an entry
//! - [`daemon`] - Scheduled compaction

pub mod active;
pub mod archive_now;
pub mod archives;
pub mod daemon;
pub mod stats;
pub mod write;

pub use active::ActiveCommand;
pub use archive_now::ArchiveNowCommand;
pub use archives::ArchivesCommand;
pub use daemon::DaemonCommand;
pub use stats::StatsCommand;
pub use write::WriteCommand;
