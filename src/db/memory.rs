use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::repository::{rank_counts, ApplierStore, JobStore, ViewStore},
    error::{AppError, AppResult},
    models::{Applier, ApplierId, ClusterLabel, JobId, JobPosting, NewViewEvent, ViewEvent},
};

/// In-process store backing all three store traits
///
/// Used by tests and local runs without PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    pub inner: Arc<RwLock<InMemoryStoreInner>>,
}

/// Inner state that can be modified
#[derive(Default)]
pub struct InMemoryStoreInner {
    pub appliers: HashMap<ApplierId, Applier>,
    pub jobs: HashMap<JobId, JobPosting>,
    pub views: Vec<ViewEvent>,
}

impl InMemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_applier(&self, applier: Applier) {
        let mut inner = self.inner.write().await;
        inner.appliers.insert(applier.id, applier);
    }

    pub async fn add_job(&self, id: JobId, created_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        inner.jobs.insert(id, JobPosting { id, created_at });
    }

    /// Logs `times` views of `job_id` by `applier_id`
    pub async fn add_views(&self, applier_id: ApplierId, job_id: JobId, times: usize) {
        let mut inner = self.inner.write().await;
        for _ in 0..times {
            inner
                .views
                .push(NewViewEvent::new(applier_id, job_id).into_event());
        }
    }

    pub async fn cluster_of(&self, applier_id: ApplierId) -> Option<ClusterLabel> {
        let inner = self.inner.read().await;
        inner.appliers.get(&applier_id).and_then(|a| a.cluster)
    }
}

fn newest_first(mut events: Vec<ViewEvent>, limit: usize) -> Vec<ViewEvent> {
    events.sort_by(|a, b| {
        b.viewed_at
            .cmp(&a.viewed_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    events.truncate(limit);
    events
}

#[async_trait]
impl ViewStore for InMemoryStore {
    async fn record_view(&self, event: NewViewEvent) -> AppResult<ViewEvent> {
        let event = event.into_event();
        let mut inner = self.inner.write().await;
        inner.views.push(event.clone());
        Ok(event)
    }

    async fn load_events(&self, cap: usize) -> AppResult<Vec<ViewEvent>> {
        let inner = self.inner.read().await;
        Ok(newest_first(inner.views.clone(), cap))
    }

    async fn views_by_applier(
        &self,
        applier_id: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ViewEvent>> {
        let inner = self.inner.read().await;
        let events = inner
            .views
            .iter()
            .filter(|v| v.applier_id == applier_id)
            .cloned()
            .collect();
        Ok(newest_first(events, limit))
    }

    async fn views_by_job(&self, job_id: JobId, limit: usize) -> AppResult<Vec<ViewEvent>> {
        let inner = self.inner.read().await;
        let events = inner
            .views
            .iter()
            .filter(|v| v.job_id == job_id)
            .cloned()
            .collect();
        Ok(newest_first(events, limit))
    }

    async fn applier_view_counts(&self, applier_id: ApplierId) -> AppResult<HashMap<JobId, u64>> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for view in inner.views.iter().filter(|v| v.applier_id == applier_id) {
            *counts.entry(view.job_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn peer_job_counts(
        &self,
        appliers: &[ApplierId],
        min_views: u64,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>> {
        let peers: HashSet<&ApplierId> = appliers.iter().collect();
        let inner = self.inner.read().await;

        let mut counts: HashMap<JobId, u64> = HashMap::new();
        for view in inner
            .views
            .iter()
            .filter(|v| peers.contains(&v.applier_id) && inner.jobs.contains_key(&v.job_id))
        {
            *counts.entry(view.job_id).or_insert(0) += 1;
        }

        let mut ranked = rank_counts(counts);
        ranked.retain(|(_, count)| *count >= min_views);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn global_job_counts(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>> {
        let inner = self.inner.read().await;

        let mut counts: HashMap<JobId, u64> = HashMap::new();
        for view in &inner.views {
            if exclude.contains(&view.job_id) || !inner.jobs.contains_key(&view.job_id) {
                continue;
            }
            *counts.entry(view.job_id).or_insert(0) += 1;
        }

        let mut ranked = rank_counts(counts);
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[async_trait]
impl ApplierStore for InMemoryStore {
    async fn find_applier(&self, applier_id: ApplierId) -> AppResult<Option<Applier>> {
        let inner = self.inner.read().await;
        Ok(inner.appliers.get(&applier_id).cloned())
    }

    async fn cluster_peers(
        &self,
        cluster_id: u32,
        exclude: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ApplierId>> {
        let inner = self.inner.read().await;
        let mut peers: Vec<Uuid> = inner
            .appliers
            .values()
            .filter(|a| a.id != exclude && a.cluster == Some(ClusterLabel::Cluster(cluster_id)))
            .map(|a| a.id)
            .collect();
        peers.sort();
        peers.truncate(limit);
        Ok(peers)
    }

    async fn clustered_appliers(&self) -> AppResult<Vec<ApplierId>> {
        let inner = self.inner.read().await;
        let mut ids: Vec<ApplierId> = inner
            .appliers
            .values()
            .filter(|a| matches!(a.cluster, Some(ClusterLabel::Cluster(_))))
            .map(|a| a.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn set_cluster_label(
        &self,
        applier_id: ApplierId,
        label: ClusterLabel,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.appliers.get_mut(&applier_id) {
            Some(applier) => {
                applier.cluster = Some(label);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("applier {}", applier_id))),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn recent_jobs(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<JobPosting>> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<JobPosting> = inner
            .jobs
            .values()
            .filter(|j| !exclude.contains(&j.id))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_peer_job_counts_applies_threshold_and_limit() {
        let store = InMemoryStore::new();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (job1, job2, job3) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        for job in [job1, job2, job3] {
            store.add_job(job, Utc::now()).await;
        }

        store.add_views(a, job1, 2).await;
        store.add_views(b, job1, 2).await;
        store.add_views(a, job2, 3).await;
        store.add_views(b, job3, 1).await;
        store.add_views(outsider, job3, 10).await;

        let counts = store.peer_job_counts(&[a, b], 2, 10).await.unwrap();
        assert_eq!(counts, vec![(job1, 4), (job2, 3)]);

        let capped = store.peer_job_counts(&[a, b], 1, 1).await.unwrap();
        assert_eq!(capped, vec![(job1, 4)]);
    }

    #[tokio::test]
    async fn test_peer_job_counts_skips_unknown_jobs() {
        let store = InMemoryStore::new();
        let (peer, known, ghost) = (Uuid::new_v4(), Uuid::from_u128(1), Uuid::from_u128(2));
        store.add_job(known, Utc::now()).await;
        store.add_views(peer, known, 3).await;
        store.add_views(peer, ghost, 8).await;

        let counts = store.peer_job_counts(&[peer], 1, 10).await.unwrap();
        assert_eq!(counts, vec![(known, 3)]);
    }

    #[tokio::test]
    async fn test_global_job_counts_skips_excluded_and_unknown_jobs() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let (known, excluded, ghost) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        store.add_job(known, now).await;
        store.add_job(excluded, now).await;

        let viewer = Uuid::new_v4();
        store.add_views(viewer, known, 1).await;
        store.add_views(viewer, excluded, 5).await;
        store.add_views(viewer, ghost, 9).await;

        let counts = store
            .global_job_counts(&HashSet::from([excluded]), 10)
            .await
            .unwrap();
        assert_eq!(counts, vec![(known, 1)]);
    }

    #[tokio::test]
    async fn test_recent_jobs_newest_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let (old, mid, new) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_job(old, now - Duration::days(2)).await;
        store.add_job(mid, now - Duration::days(1)).await;
        store.add_job(new, now).await;

        let jobs = store
            .recent_jobs(&HashSet::from([mid]), 10)
            .await
            .unwrap();
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![new, old]);
    }

    #[tokio::test]
    async fn test_cluster_peers_excludes_target_and_other_labels() {
        let store = InMemoryStore::new();
        let target = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let noise = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.add_applier(Applier::new(target).with_cluster(ClusterLabel::Cluster(0))).await;
        store.add_applier(Applier::new(peer).with_cluster(ClusterLabel::Cluster(0))).await;
        store.add_applier(Applier::new(noise).with_cluster(ClusterLabel::Unassigned)).await;
        store.add_applier(Applier::new(other).with_cluster(ClusterLabel::Cluster(1))).await;

        let peers = store.cluster_peers(0, target, 100).await.unwrap();
        assert_eq!(peers, vec![peer]);
    }

    #[tokio::test]
    async fn test_clustered_appliers_skips_unassigned_and_unlabelled() {
        let store = InMemoryStore::new();
        let (member, noise, fresh) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_applier(Applier::new(member).with_cluster(ClusterLabel::Cluster(2))).await;
        store.add_applier(Applier::new(noise).with_cluster(ClusterLabel::Unassigned)).await;
        store.add_applier(Applier::new(fresh)).await;

        assert_eq!(store.clustered_appliers().await.unwrap(), vec![member]);
    }

    #[tokio::test]
    async fn test_set_cluster_label_unknown_applier() {
        let store = InMemoryStore::new();
        let result = store
            .set_cluster_label(Uuid::new_v4(), ClusterLabel::Cluster(3))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
