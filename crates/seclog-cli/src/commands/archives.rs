//! Archive listing and archive contents.

use std::io::Write;

use seclog_core::SecurityLogService;
use tracing::debug;

use crate::cli::PageArgs;
use crate::error::CliError;
use crate::output::{ArchiveList, OutputFormat};

/// Handler for the archives and archive commands.
pub struct ArchivesCommand<'a> {
    service: &'a SecurityLogService,
}

impl<'a> ArchivesCommand<'a> {
    /// Creates a new archives command handler.
    #[must_use]
    pub const fn new(service: &'a SecurityLogService) -> Self {
        Self { service }
    }

    /// Prints the archives on disk, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the archive directory cannot be read.
    pub fn list<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = ArchiveList {
            archives: self.service.get_archive_list()?,
        };
        format.write(out, &list)
    }

    /// Prints one page of records from archive `id`.
    ///
    /// # Errors
    ///
    /// Returns error if `id` is malformed, the archive does not exist or
    /// cannot be opened, or the page is invalid.
    pub fn show<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        id: &str,
        args: &PageArgs,
    ) -> Result<(), CliError> {
        let per_page = args
            .per_page
            .unwrap_or(self.service.config().default_per_page);
        debug!(archive = id, page = args.page, per_page, "showing archive");

        let page = self.service.get_archive_page(id, args.page, per_page)?;
        format.write(out, &page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use chrono::NaiveDate;
    use seclog_core::{EngineConfig, LogError};
    use std::fs;
    use tempfile::TempDir;

    fn archived_service() -> (TempDir, SecurityLogService) {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(
            dir.path().join("security-2025-01-15.log"),
            "[2025-01-15 08:00:00] production.INFO: inside the archive\n",
        )
        .expect("write");
        let service = SecurityLogService::new(EngineConfig::new(dir.path())).expect("service");
        let today = NaiveDate::from_ymd_opt(2025, 2, 10).expect("valid date");
        assert_eq!(service.archive_as_of(today).archived.len(), 1);
        (dir, service)
    }

    #[test]
    fn lists_archives() {
        let (_dir, service) = archived_service();
        let mut out = Vec::new();
        ArchivesCommand::new(&service)
            .list(&mut out, &OutputFormat::new(Format::Table))
            .expect("list");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("security-logs-2025-01.zip"));
    }

    #[test]
    fn shows_archive_records_as_json() {
        let (_dir, service) = archived_service();
        let mut out = Vec::new();
        ArchivesCommand::new(&service)
            .show(
                &mut out,
                &OutputFormat::new(Format::Json),
                "security-logs-2025-01.zip",
                &PageArgs::default(),
            )
            .expect("show");

        let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");
        assert_eq!(value["total"], 1);
        assert_eq!(value["data"][0]["message"], "inside the archive");
    }

    #[test]
    fn traversal_id_is_rejected() {
        let (_dir, service) = archived_service();
        let err = ArchivesCommand::new(&service)
            .show(
                &mut Vec::new(),
                &OutputFormat::default(),
                "../../etc/passwd.zip",
                &PageArgs::default(),
            )
            .expect_err("rejected");
        assert!(matches!(err, CliError::Engine(LogError::InvalidIdentifier(_))));
        assert_eq!(err.exit_code(), 2);
    }
}
