use crate::feed::{fetch_releases, FetchError, ReleaseEntry};
use crate::notify::{DeliveryError, Notifier};
use crate::storage::Database;
use thiserror::Error;

/// A failure inside one poll cycle.
///
/// None of these are fatal to the process: the scheduler's launch wrapper
/// logs the error and the next tick fires on schedule.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The feed parsed but contained zero entries.
    #[error("Feed contained no entries")]
    EmptyFeed,
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("State store failure: {0}")]
    Store(anyhow::Error),
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing newer than the watermark; the common steady-state case.
    UpToDate,
    /// A new release was delivered and the watermark advanced.
    Notified { updated: i64 },
}

/// Run one fetch→select→compare→notify→persist pass.
///
/// Steps are strictly sequential: the fetch completes before selection,
/// selection before the watermark comparison, and delivery before any
/// watermark write. The watermark only moves after the webhook confirmed
/// the post with a 200, so a failed delivery is retried on the next cycle
/// rather than silently swallowed.
pub async fn run_cycle(
    client: &reqwest::Client,
    db: &Database,
    notifier: &Notifier,
    feed_url: &str,
) -> Result<CycleOutcome, WatchError> {
    let entries = fetch_releases(client, feed_url).await?;
    let latest = latest_entry(&entries).ok_or(WatchError::EmptyFeed)?;

    let watermark = db.last_updated().await.map_err(WatchError::Store)?;
    if latest.updated <= watermark {
        tracing::debug!(
            watermark,
            latest = latest.updated,
            "No release newer than watermark"
        );
        return Ok(CycleOutcome::UpToDate);
    }

    notifier.deliver(latest).await?;

    // Delivery confirmed; only now may the watermark move.
    let advanced = db
        .advance_watermark(latest.updated)
        .await
        .map_err(WatchError::Store)?;
    if !advanced {
        tracing::debug!(
            updated = latest.updated,
            "Watermark already advanced by a concurrent cycle"
        );
    }
    tracing::info!(
        version = %latest.title,
        updated = latest.updated,
        "Posted release notification to Slack"
    );

    Ok(CycleOutcome::Notified {
        updated: latest.updated,
    })
}

/// Pick the entry with the maximum `updated` timestamp.
///
/// Ties are broken arbitrarily; any maximal element is acceptable.
fn latest_entry(entries: &[ReleaseEntry]) -> Option<&ReleaseEntry> {
    entries.iter().max_by_key(|e| e.updated)
}
