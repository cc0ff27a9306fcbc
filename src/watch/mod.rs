//! The polling core: one-shot cycles and the timer loop that drives them.
//!
//! [`run_cycle`] performs a single fetch→select→compare→notify→persist pass;
//! [`run_forever`] wires it into the fixed-interval scheduler with the
//! catch-all logging boundary that keeps any single failure from stopping
//! the loop.

mod cycle;
mod scheduler;

pub use cycle::{run_cycle, CycleOutcome, WatchError};
pub use scheduler::{
    clamp_interval, run_scheduler, DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};

use crate::notify::Notifier;
use crate::storage::Database;
use std::sync::Arc;

/// Run the watch loop until the process exits.
///
/// Every error a cycle can produce is converted into a log entry here; the
/// scheduler never sees it and the next tick fires on schedule.
pub async fn run_forever(
    client: reqwest::Client,
    db: Database,
    notifier: Notifier,
    feed_url: String,
    interval_seconds: u64,
    allow_overlapping_cycles: bool,
) {
    let notifier = Arc::new(notifier);
    run_scheduler(interval_seconds, allow_overlapping_cycles, move || {
        let client = client.clone();
        let db = db.clone();
        let notifier = Arc::clone(&notifier);
        let feed_url = feed_url.clone();
        async move {
            match run_cycle(&client, &db, &notifier, &feed_url).await {
                Ok(outcome) => tracing::debug!(?outcome, "Poll cycle finished"),
                Err(e) => tracing::error!(error = %e, "Poll cycle failed"),
            }
        }
    })
    .await
}
