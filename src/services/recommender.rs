use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::{ApplierStore, JobStore, ViewStore},
    error::AppResult,
    models::{ApplierId, ClusterLabel, JobId},
    services::{
        fallback::FallbackCascade,
        scoring::{rank, score_candidates},
    },
};

/// Tunables for cluster scoring and the fallback cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommenderSettings {
    /// Minimum peer view count for a job to become a cluster candidate
    pub popularity_threshold: u64,
    /// Cluster candidate pool is `candidate_oversampling * limit`
    pub candidate_oversampling: usize,
    /// Global popularity pool is `fallback_oversampling * remaining`
    pub fallback_oversampling: usize,
    /// Maximum number of co-members read per request
    pub peer_lookup_cap: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            popularity_threshold: 3,
            candidate_oversampling: 3,
            fallback_oversampling: 2,
            peer_lookup_cap: 100,
        }
    }
}

/// Produces ranked job recommendations for one applier
///
/// Appliers with a cluster are scored by what their co-members viewed, with
/// their own repeat views decayed. Any shortfall, and every applier without a
/// usable cluster, goes through the [`FallbackCascade`].
pub struct RecommendationService {
    appliers: Arc<dyn ApplierStore>,
    views: Arc<dyn ViewStore>,
    cascade: FallbackCascade,
    settings: RecommenderSettings,
}

impl RecommendationService {
    pub fn new(
        appliers: Arc<dyn ApplierStore>,
        views: Arc<dyn ViewStore>,
        jobs: Arc<dyn JobStore>,
        settings: RecommenderSettings,
    ) -> Self {
        let cascade =
            FallbackCascade::standard(views.clone(), jobs, settings.fallback_oversampling);
        Self {
            appliers,
            views,
            cascade,
            settings,
        }
    }

    /// Up to `limit` distinct job ids, most relevant first
    ///
    /// Never fails: lookup and query errors are logged and the request falls
    /// through to the cascade. The list is shorter than `limit` only when the
    /// job corpus is.
    pub async fn recommend(
        &self,
        applier_id: ApplierId,
        limit: usize,
        decay_factor: f64,
    ) -> Vec<JobId> {
        if limit == 0 {
            return Vec::new();
        }

        let mut recommended = match self.cluster_scoring(applier_id, limit, decay_factor).await {
            Ok(Some(jobs)) => jobs,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    applier_id = %applier_id,
                    error = %e,
                    "Cluster lookup failed, using fallback cascade"
                );
                Vec::new()
            }
        };

        if recommended.len() < limit {
            let chosen: HashSet<JobId> = recommended.iter().copied().collect();
            let shortfall = limit - recommended.len();

            tracing::debug!(
                applier_id = %applier_id,
                from_cluster = recommended.len(),
                shortfall,
                "Backfilling with fallback cascade"
            );

            let backfill = self
                .cascade
                .fill(applier_id, shortfall, decay_factor, &chosen)
                .await;
            recommended.extend(backfill);
        }

        tracing::info!(
            applier_id = %applier_id,
            limit,
            returned = recommended.len(),
            "Recommendations produced"
        );

        recommended
    }

    /// Ranks jobs popular within the applier's cluster
    ///
    /// `Ok(None)` when cluster scoring does not apply: unknown applier, no
    /// label, the unassigned label, or a cluster with no other members.
    async fn cluster_scoring(
        &self,
        applier_id: ApplierId,
        limit: usize,
        decay_factor: f64,
    ) -> AppResult<Option<Vec<JobId>>> {
        let cluster_id = match self.appliers.find_applier(applier_id).await? {
            Some(applier) => match applier.cluster {
                Some(ClusterLabel::Cluster(id)) => id,
                _ => return Ok(None),
            },
            None => return Ok(None),
        };

        let peers = self
            .appliers
            .cluster_peers(cluster_id, applier_id, self.settings.peer_lookup_cap)
            .await?;
        if peers.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .views
            .peer_job_counts(
                &peers,
                self.settings.popularity_threshold,
                limit * self.settings.candidate_oversampling.max(1),
            )
            .await?;
        let personal_views = self.views.applier_view_counts(applier_id).await?;

        tracing::debug!(
            applier_id = %applier_id,
            cluster_id,
            peers = peers.len(),
            candidates = candidates.len(),
            "Scoring cluster candidates"
        );

        let scores = score_candidates(&candidates, &personal_views, decay_factor);
        Ok(Some(rank(scores, limit)))
    }
}
