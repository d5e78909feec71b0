//! Fixed-cadence cycle driver.
//!
//! One interval for the whole process; every tick attempts one cycle. The
//! re-entrancy check lives in [`App::run_cycle`], so a tick that fires while
//! the previous cycle is still in flight is simply dropped rather than
//! queued. A cycle error (a failed persistence write) is fatal: the driver
//! returns it and the process terminates instead of cycling through silent
//! data loss.

use std::sync::Arc;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::app::App;

pub async fn run(app: Arc<App>) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(app.config.ping_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(
        "starting ping cycles every {}ms",
        app.config.ping_interval().as_millis()
    );

    loop {
        interval.tick().await;
        app.run_cycle().await.context("ping cycle failed")?;
    }
}
