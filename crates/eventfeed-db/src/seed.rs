use chrono::{DateTime, Utc};
use eventfeed_core::SeedFile;

use crate::{ContentStore, DbError};

/// Counts of records written by [`seed_demo_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub events: usize,
    pub posts: usize,
}

/// Write the demo content in `seed` into `store`, anchored at `now`.
///
/// Seed ids are deterministic, so running this twice replaces the earlier
/// rows instead of duplicating them.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails; the Postgres backend rolls the
/// whole batch back.
pub async fn seed_demo_data(
    store: &dyn ContentStore,
    seed: SeedFile,
    now: DateTime<Utc>,
) -> Result<SeedSummary, DbError> {
    let (events, posts) = seed.into_records(now);
    let summary = SeedSummary {
        events: events.len(),
        posts: posts.len(),
    };
    store.import_records(events, posts).await?;
    tracing::info!(
        backend = store.backend_name(),
        events = summary.events,
        posts = summary.posts,
        "seeded demo data"
    );
    Ok(summary)
}
