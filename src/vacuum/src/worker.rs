//! Periodic scheduling loop.
//!
//! The loop ticks at a fixed interval and runs one pass per tick. Stopping it
//! prevents future ticks; a pass already running is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::config::VacuumMode;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::metrics::VacuumMetrics;
use crate::vacuumer::{VacuumError, VacuumService};

/// Shortest interval the loop ticks at; a zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running scheduling loop.
pub struct VacuumScheduler {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl VacuumScheduler {
    /// Spawn the loop on the current runtime. The first tick fires immediately.
    ///
    /// A zero `interval` is clamped to [`MIN_INTERVAL`].
    pub fn spawn(
        service: Arc<dyn VacuumService>,
        interval: Duration,
        mode: VacuumMode,
        metrics: VacuumMetrics,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!(min = ?MIN_INTERVAL, "Zero vacuuming interval, using the minimum instead");
            MIN_INTERVAL
        } else {
            interval
        };
        let (shutdown, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(?interval, ?mode, "Vacuuming scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("Vacuuming scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        debug!(?mode, "Running scheduled vacuuming pass");
                        let result = match mode {
                            VacuumMode::All => service.run_all().await,
                            VacuumMode::Due => service.run_due(Utc::now()).await,
                        };
                        match result {
                            Ok(report) => report.log(),
                            Err(VacuumError::PassInFlight) => {
                                warn!("Skipping tick: a vacuuming pass is already in flight");
                            }
                            Err(e) => {
                                metrics.record_pass_errored();
                                error!(error = %e, "Scheduled vacuuming pass failed");
                            }
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// An in-flight pass runs to completion before this returns.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            error!(error = %e, "Vacuuming scheduler task panicked");
        }
    }
}
