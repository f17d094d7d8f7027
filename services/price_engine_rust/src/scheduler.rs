//! Fixed-period polling
//!
//! Each tick spawns a cycle and returns to the timer. A tick that lands while
//! a slow fetch is still running is dropped by the engine's in-flight guard.

use crate::engine::{AcquisitionEngine, CycleOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub fn spawn_poll_loop(engine: Arc<AcquisitionEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Poll loop started (interval: {:?})", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; the startup cycle already ran.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let engine = engine.clone();
            tokio::spawn(async move {
                match engine.run_cycle().await {
                    CycleOutcome::Skipped => {}
                    outcome => debug!("Cycle finished: {:?}", outcome),
                }
            });
        }
    })
}
