use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::handle::DriverHandle;
use super::scheduler::Scheduler;
use crate::time::WallClock;

/// A scheduler shared between the driver task and the host.
pub type SharedScheduler = Arc<Mutex<Scheduler>>;

/// Ticks a shared scheduler from a tokio interval using wall-clock time.
pub struct Driver;

impl Driver {
    /// Wrap a scheduler for sharing with a driver.
    pub fn share(scheduler: Scheduler) -> SharedScheduler {
        Arc::new(Mutex::new(scheduler))
    }

    /// Spawn the tick loop on the current tokio runtime.
    ///
    /// The period and delta clamp come from the scheduler's settings. Missed
    /// periods are skipped rather than replayed; the next tick simply sees a
    /// larger `now`.
    pub fn spawn(shared: SharedScheduler) -> DriverHandle {
        let (tick_rate, max_delta, start) = {
            let scheduler = shared.lock();
            (
                scheduler.settings().tick_rate,
                scheduler.settings().max_delta,
                scheduler.now(),
            )
        };
        info!(tick_rate, max_delta, start, "Starting scheduler driver");

        let task = tokio::spawn(async move {
            let mut clock = WallClock::new(start, max_delta);
            let mut interval = tokio::time::interval(Duration::from_secs_f64(tick_rate));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip first tick (it fires immediately)
            interval.tick().await;

            loop {
                interval.tick().await;
                let result = {
                    let mut scheduler = shared.lock();
                    scheduler.tick(&mut clock)
                };
                if let Err(e) = result {
                    warn!(error = %e, "scheduler tick failed");
                }
            }
        });

        DriverHandle { task }
    }
}
