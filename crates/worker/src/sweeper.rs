//! Timer for the retention sweep.

use std::time::Duration;

use chrono::Utc;

use beacon_engine::RetentionSweep;

/// Run `sweep` now and then every `every` until cancelled.
///
/// A failed sweep is logged; the next tick tries again.
pub async fn run(sweep: RetentionSweep, every: Duration) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = sweep.run(Utc::now()).await {
            tracing::error!(error = %e, "Retention sweep failed");
        }
    }
}
