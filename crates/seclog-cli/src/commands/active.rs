//! Active command implementation.

use std::io::Write;

use seclog_core::SecurityLogService;
use tracing::debug;

use crate::cli::PageArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the active command.
pub struct ActiveCommand<'a> {
    service: &'a SecurityLogService,
}

impl<'a> ActiveCommand<'a> {
    /// Creates a new active command handler.
    #[must_use]
    pub const fn new(service: &'a SecurityLogService) -> Self {
        Self { service }
    }

    /// Prints one page of active records.
    ///
    /// # Errors
    ///
    /// Returns error if the page is invalid or the log root cannot be read.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &PageArgs,
    ) -> Result<(), CliError> {
        let per_page = args
            .per_page
            .unwrap_or(self.service.config().default_per_page);
        debug!(page = args.page, per_page, "listing active records");

        let page = self.service.get_active_page(args.page, per_page)?;
        format.write(out, &page)
    }
}
