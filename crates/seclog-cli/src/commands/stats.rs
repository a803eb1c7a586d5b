//! Stats command implementation.

use std::io::Write;

use seclog_core::SecurityLogService;

use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the stats command.
pub struct StatsCommand<'a> {
    service: &'a SecurityLogService,
}

impl<'a> StatsCommand<'a> {
    /// Creates a new stats command handler.
    #[must_use]
    pub const fn new(service: &'a SecurityLogService) -> Self {
        Self { service }
    }

    /// Prints record and archive counters.
    ///
    /// # Errors
    ///
    /// Returns error if the log root or archive directory cannot be read.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let stats = self.service.get_statistics()?;
        format.write(out, &stats)
    }
}
