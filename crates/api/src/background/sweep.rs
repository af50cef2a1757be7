//! Daily reconciliation sweep.
//!
//! Runs once at startup and then at every local midnight (as defined by
//! the configured UTC offset). Each pass applies every overdue activation
//! and expiry and arms one-off timers for the rest of the day, which makes
//! it the durability guarantee for transitions lost across restarts.

use accessgate_core::scheduling::ScheduleClock;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::engine::release::ReleaseService;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(service: ReleaseService, clock: ScheduleClock, cancel: CancellationToken) {
    tracing::info!(
        utc_offset_secs = clock.offset().local_minus_utc(),
        "Release sweep started"
    );

    loop {
        if let Err(e) = service.reconcile(Utc::now()).await {
            tracing::error!(error = %e, "Release sweep failed");
        }

        let now = Utc::now();
        let next = clock.next_local_midnight(now);
        let delay = clock.delay_until(next, now);
        tracing::debug!(next_run = %next, "Next release sweep scheduled");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Release sweep stopping");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
