//! Periodic archival.
//!
//! [`RetentionScheduler`] calls [`SecurityLogService::archive_now_with`] on a
//! fixed interval. The first run happens immediately. Runs execute on the
//! blocking pool, so a slow archive never stalls the runtime; stopping the
//! scheduler also cancels a run in progress between months.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::service::SecurityLogService;

/// Shortest period the loop will tick at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs archival on a fixed interval.
pub struct RetentionScheduler {
    service: Arc<SecurityLogService>,
    interval: Duration,
}

impl RetentionScheduler {
    /// Creates a scheduler using the service's configured interval.
    #[must_use]
    pub fn new(service: Arc<SecurityLogService>) -> Self {
        let interval = service.config().schedule_interval;
        Self { service, interval }
    }

    /// Overrides the interval. Values below [`MIN_INTERVAL`] are raised to it.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(requested_ms = interval.as_millis(), "scheduler interval raised to the minimum");
        }
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Spawns the scheduling loop on the current tokio runtime.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let runs = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_loop(
            self.service,
            self.interval.max(MIN_INTERVAL),
            cancel.clone(),
            Arc::clone(&runs),
        ));

        SchedulerHandle { cancel, runs, task }
    }
}

async fn run_loop(
    service: Arc<SecurityLogService>,
    period: Duration,
    cancel: CancellationToken,
    runs: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "retention scheduler started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let svc = Arc::clone(&service);
        let token = cancel.child_token();
        match tokio::task::spawn_blocking(move || svc.archive_now_with(&token)).await {
            Ok(report) => {
                if report.errors.is_empty() {
                    info!(archived = report.archived.len(), "scheduled archival complete");
                } else {
                    warn!(
                        archived = report.archived.len(),
                        errors = report.errors.len(),
                        "scheduled archival finished with errors"
                    );
                    for message in &report.errors {
                        warn!(error = %message, "archival failure");
                    }
                }
            }
            Err(e) => error!(error = %e, "scheduled archival task failed"),
        }
        runs.fetch_add(1, Ordering::SeqCst);
    }

    info!("retention scheduler stopped");
}

/// Control handle for a running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    runs: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Asks the scheduler to stop; an archival run in progress stops
    /// before its next month.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Number of completed runs.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Returns true once the scheduling loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the scheduler, waits for the loop to exit, and returns the
    /// number of completed runs.
    pub async fn shutdown(self) -> u64 {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "retention scheduler panicked");
        }
        self.runs.load(Ordering::SeqCst)
    }
}
