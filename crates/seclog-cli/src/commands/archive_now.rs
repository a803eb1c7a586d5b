//! Archive-now command implementation.

use std::io::Write;

use seclog_core::SecurityLogService;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the archive-now command.
pub struct ArchiveNowCommand<'a> {
    service: &'a SecurityLogService,
}

impl<'a> ArchiveNowCommand<'a> {
    /// Creates a new archive-now command handler.
    #[must_use]
    pub const fn new(service: &'a SecurityLogService) -> Self {
        Self { service }
    }

    /// Runs one compaction and prints the report.
    ///
    /// Per-file failures are part of the report, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be written.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let report = self.service.archive_now();
        if report.errors.is_empty() {
            info!(archived = report.archived.len(), "archival complete");
        } else {
            warn!(
                archived = report.archived.len(),
                errors = report.errors.len(),
                "archival finished with errors"
            );
        }
        format.write(out, &report)
    }
}
