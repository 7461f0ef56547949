//! Interval loops for the always-on duties.
//!
//! Verification, snapshot pushing, pruning, and drills each run on
//! their own cadence in independent tasks; one stuck loop never blocks
//! the others. A missed tick runs late rather than bursting.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Owns the spawned loop tasks; aborting them on shutdown.
#[derive(Debug, Default)]
pub struct Scheduler {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    /// Create an empty scheduler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named loop running `task` every `period`. The first run
    /// happens after one full period, not immediately.
    pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Swallow the immediate first tick.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!(loop_name = name, "scheduled run");
                task().await;
            }
        });
        self.handles.push((name, handle));
    }

    /// Names of the loops currently running
    #[must_use]
    pub fn running(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(name, _)| *name).collect()
    }

    /// Abort every loop
    pub fn shutdown(self) {
        for (name, handle) in self.handles {
            debug!(loop_name = name, "aborting scheduled loop");
            handle.abort();
        }
    }
}
