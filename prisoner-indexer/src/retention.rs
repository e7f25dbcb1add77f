//! Dedup store retention.
//!
//! Hash rows for prisoners that have not changed in a long time are dropped.
//! Losing a row only means the next change for that prisoner is published
//! again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use prisoner_indexer_repository::{EntityHashRepository, HashStream, RepositoryError};

/// How often the background retention task runs.
pub const RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete hash rows of both streams not updated within `older_than_days`.
///
/// Returns the number of rows deleted.
pub async fn purge_stale_hashes(
    hashes: &dyn EntityHashRepository,
    older_than_days: u32,
) -> Result<u64, RepositoryError> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));

    let mut deleted = 0;
    for stream in [HashStream::Document, HashStream::Event] {
        deleted += hashes.delete_older_than(stream, cutoff).await?;
    }

    info!(
        older_than_days = older_than_days,
        cutoff = %cutoff,
        deleted = deleted,
        event = "hash_retention",
        "Purged stale hashes"
    );
    Ok(deleted)
}

/// Run [`purge_stale_hashes`] every `period`, starting after the first period.
pub fn spawn_retention_task(
    hashes: Arc<dyn EntityHashRepository>,
    older_than_days: u32,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer.tick().await;
        loop {
            timer.tick().await;
            if let Err(e) = purge_stale_hashes(hashes.as_ref(), older_than_days).await {
                error!(error = %e, "Hash retention failed");
            }
        }
    })
}
