//! Daemon command implementation.
//!
//! Runs the retention scheduler until ctrl-c, then waits for a run in
//! progress to stop at its next month boundary.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use seclog_core::{RetentionScheduler, SecurityLogService};
use tracing::info;

use crate::error::CliError;
use crate::output::{DaemonSummary, OutputFormat};

/// Handler for the daemon command.
pub struct DaemonCommand {
    service: Arc<SecurityLogService>,
}

impl DaemonCommand {
    /// Creates a new daemon command handler.
    #[must_use]
    pub const fn new(service: Arc<SecurityLogService>) -> Self {
        Self { service }
    }

    /// Runs until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error if the signal handler cannot be installed or the
    /// summary cannot be written.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        interval: Option<u64>,
    ) -> Result<(), CliError> {
        self.run_until(out, format, interval, async {
            tokio::signal::ctrl_c().await
        })
        .await
    }

    /// Runs until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns error if `shutdown` fails or the summary cannot be written.
    pub async fn run_until<W, F>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        interval: Option<u64>,
        shutdown: F,
    ) -> Result<(), CliError>
    where
        W: Write,
        F: Future<Output = std::io::Result<()>>,
    {
        let mut scheduler = RetentionScheduler::new(Arc::clone(&self.service));
        if let Some(secs) = interval {
            if secs == 0 {
                return Err(CliError::InvalidArgument(
                    "interval must be at least 1 second".to_string(),
                ));
            }
            scheduler = scheduler.with_interval(Duration::from_secs(secs));
        }

        let handle = scheduler.start();
        let waited = shutdown.await;
        info!("shutdown requested");

        let runs = handle.shutdown().await;
        waited?;

        format.write(out, &DaemonSummary { runs })
    }
}
