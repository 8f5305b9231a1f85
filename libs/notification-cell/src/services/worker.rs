use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use shared_config::AppConfig;

use crate::services::scheduler::NotificationScheduler;

/// Periodic reminder sweep. The first tick fires immediately so reminders
/// that fell due while the service was down go out at startup.
pub struct ReminderSweepWorker {
    scheduler: Arc<NotificationScheduler>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl ReminderSweepWorker {
    pub fn new(config: &AppConfig, scheduler: Arc<NotificationScheduler>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            scheduler,
            interval: Duration::from_secs(config.reminder_sweep_interval_secs.max(1)),
            shutdown_tx,
        }
    }

    /// Runs until [`ReminderSweepWorker::shutdown`] is called.
    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Reminder sweep worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep().await,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reminder sweep worker stopped");
    }

    pub fn shutdown(&self) {
        debug!("Reminder sweep worker shutdown requested");
        self.shutdown_tx.send_replace(true);
    }

    async fn sweep(&self) {
        match self.scheduler.dispatch_due().await {
            Ok(reports) => debug!("Sweep finished with {} reports", reports.len()),
            Err(e) => error!("Reminder sweep failed: {}", e),
        }
    }
}
