use log::{debug, error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::collectors::SensorSource;
use crate::models::SensorTable;
use crate::utils::shutdown::ShutdownListener;

/// Result of one pass over the monitored sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sweep {
    pub updated: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Sole writer of sensor values: re-reads every monitored sensor once per interval.
pub struct SensorPoller {
    source: Box<dyn SensorSource>,
    table: Arc<SensorTable>,
    interval: Duration,
}

impl SensorPoller {
    pub fn new(source: Box<dyn SensorSource>, table: Arc<SensorTable>, interval: Duration) -> Self {
        Self {
            source,
            table,
            interval,
        }
    }

    pub async fn run(mut self, mut shutdown: ShutdownListener) {
        info!(
            "Sensor poller started: {} monitored sensors every {} ms",
            self.table.monitored().count(),
            self.interval.as_millis()
        );

        loop {
            let sweep = self.sweep(&shutdown);
            if sweep.interrupted {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.triggered() => break,
            }
        }

        info!("Sensor poller stopped");
    }

    /// Reads every monitored sensor once. A failed read leaves the previous
    /// value in place. Stops early when `shutdown` is triggered.
    pub fn sweep(&mut self, shutdown: &ShutdownListener) -> Sweep {
        let start = Instant::now();
        let mut sweep = Sweep::default();

        for (id, entry) in self.table.monitored() {
            if shutdown.is_triggered() {
                debug!("Sweep interrupted by shutdown");
                sweep.interrupted = true;
                return sweep;
            }

            match self.source.read(id) {
                Ok(value) => {
                    entry.store(value);
                    sweep.updated += 1;
                }
                Err(e) => {
                    error!("Failed to get value from sensor {}: {}", id, e);
                    sweep.failed += 1;
                }
            }
        }

        debug!(
            "sweep took: {} ms ({} updated, {} failed)",
            start.elapsed().as_millis(),
            sweep.updated,
            sweep.failed
        );
        sweep
    }
}
