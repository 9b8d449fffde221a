use std::collections::BTreeMap;

use crate::{
    db::ViewStore,
    error::AppResult,
    models::{ApplierId, JobId, ViewEvent},
};

/// View counts for one applier, keyed by job
pub type JobViewCounts = BTreeMap<JobId, u64>;

/// Per-applier, per-job view counts
///
/// Ordered maps keep iteration order independent of hashing, which the
/// vectorizer relies on for reproducible output.
pub type ViewCounts = BTreeMap<ApplierId, JobViewCounts>;

/// Folds raw view events into per-applier, per-job counts
pub fn aggregate(events: &[ViewEvent]) -> ViewCounts {
    let mut counts = ViewCounts::new();
    for event in events {
        *counts
            .entry(event.applier_id)
            .or_default()
            .entry(event.job_id)
            .or_insert(0) += 1;
    }
    counts
}

/// Loads at most `cap` events from the store and aggregates them
///
/// An empty result is a normal state ("no signal yet"), not an error.
pub async fn load_view_counts(views: &dyn ViewStore, cap: usize) -> AppResult<ViewCounts> {
    let events = views.load_events(cap).await?;

    tracing::info!(events = events.len(), cap, "Loaded view events for aggregation");

    if events.len() == cap {
        tracing::warn!(cap, "View event cap reached, older events were not aggregated");
    }

    Ok(aggregate(&events))
}
