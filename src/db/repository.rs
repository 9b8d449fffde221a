use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Applier, ApplierId, ClusterLabel, JobId, JobPosting, NewViewEvent, ViewEvent},
};

/// Access to the append-only `log_views` collection
///
/// Aggregating queries return `(job, count)` pairs ordered by count descending,
/// ties broken by job id ascending, so callers can rely on a stable order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Appends a view event
    async fn record_view(&self, event: NewViewEvent) -> AppResult<ViewEvent>;

    /// Loads at most `cap` events, newest first
    async fn load_events(&self, cap: usize) -> AppResult<Vec<ViewEvent>>;

    async fn views_by_applier(
        &self,
        applier_id: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ViewEvent>>;

    async fn views_by_job(&self, job_id: JobId, limit: usize) -> AppResult<Vec<ViewEvent>>;

    /// How many times one applier viewed each job
    async fn applier_view_counts(&self, applier_id: ApplierId) -> AppResult<HashMap<JobId, u64>>;

    /// Views per existing job across `appliers`, keeping jobs with at least `min_views`
    async fn peer_job_counts(
        &self,
        appliers: &[ApplierId],
        min_views: u64,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>>;

    /// Views per existing job across every applier, skipping `exclude` and unviewed jobs
    async fn global_job_counts(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>>;
}

/// Access to applier records and their cluster labels
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplierStore: Send + Sync {
    async fn find_applier(&self, applier_id: ApplierId) -> AppResult<Option<Applier>>;

    /// Other appliers sharing cluster `cluster_id`
    async fn cluster_peers(
        &self,
        cluster_id: u32,
        exclude: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ApplierId>>;

    /// Appliers currently carrying a cluster id
    async fn clustered_appliers(&self) -> AppResult<Vec<ApplierId>>;

    /// Overwrites one applier's label. Fails with `NotFound` for unknown appliers.
    async fn set_cluster_label(&self, applier_id: ApplierId, label: ClusterLabel)
        -> AppResult<()>;
}

/// Access to job postings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Newest postings first, skipping `exclude`
    async fn recent_jobs(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<JobPosting>>;
}

/// Sorts `(job, count)` pairs by count descending, then job id ascending
pub fn rank_counts(counts: HashMap<JobId, u64>) -> Vec<(JobId, u64)> {
    let mut ranked: Vec<(JobId, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_rank_counts_orders_by_count_then_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let top = Uuid::from_u128(3);

        let counts = HashMap::from([(high, 2), (top, 5), (low, 2)]);
        let ranked = rank_counts(counts);

        assert_eq!(ranked, vec![(top, 5), (low, 2), (high, 2)]);
    }
}
