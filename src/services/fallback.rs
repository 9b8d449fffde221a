use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    db::{JobStore, ViewStore},
    error::AppResult,
    models::{ApplierId, JobId},
    services::scoring::{rank, score_candidates},
};

/// What a fallback tier is asked to produce
#[derive(Debug, Clone, Copy)]
pub struct FillRequest<'a> {
    pub applier_id: ApplierId,
    /// How many more jobs are still needed
    pub quota: usize,
    pub decay_factor: f64,
    /// Jobs already chosen; a tier must not return any of these
    pub exclude: &'a HashSet<JobId>,
}

/// One tier of the fallback cascade
#[async_trait]
pub trait FillStrategy: Send + Sync {
    /// Tier name for logging
    fn name(&self) -> &'static str;

    /// Returns up to `request.quota` jobs, best first.
    /// An empty result means the tier has nothing to offer.
    async fn fill(&self, request: &FillRequest<'_>) -> AppResult<Vec<JobId>>;
}

/// Global popularity weighted by the applier's own views
///
/// Only applies to appliers with some view history of their own.
pub struct PopularityWithDecay {
    views: Arc<dyn ViewStore>,
    oversampling: usize,
}

impl PopularityWithDecay {
    pub fn new(views: Arc<dyn ViewStore>, oversampling: usize) -> Self {
        Self {
            views,
            oversampling: oversampling.max(1),
        }
    }
}

#[async_trait]
impl FillStrategy for PopularityWithDecay {
    fn name(&self) -> &'static str {
        "popularity_with_decay"
    }

    async fn fill(&self, request: &FillRequest<'_>) -> AppResult<Vec<JobId>> {
        let personal_views = self.views.applier_view_counts(request.applier_id).await?;
        if personal_views.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .views
            .global_job_counts(request.exclude, request.quota * self.oversampling)
            .await?;

        let scores = score_candidates(&candidates, &personal_views, request.decay_factor);
        Ok(rank(scores, request.quota))
    }
}

/// Most recently created jobs, unscored
pub struct Recency {
    jobs: Arc<dyn JobStore>,
}

impl Recency {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl FillStrategy for Recency {
    fn name(&self) -> &'static str {
        "recency"
    }

    async fn fill(&self, request: &FillRequest<'_>) -> AppResult<Vec<JobId>> {
        let jobs = self.jobs.recent_jobs(request.exclude, request.quota).await?;
        Ok(jobs.into_iter().map(|job| job.id).collect())
    }
}

/// Ordered list of decreasingly personalised tiers
///
/// Each tier only sees the quota the earlier tiers left unfilled, and never
/// returns a job chosen before it. Tier failures are logged and skipped.
pub struct FallbackCascade {
    tiers: Vec<Box<dyn FillStrategy>>,
}

impl FallbackCascade {
    pub fn new(tiers: Vec<Box<dyn FillStrategy>>) -> Self {
        Self { tiers }
    }

    /// Popularity-with-decay, then recency
    pub fn standard(
        views: Arc<dyn ViewStore>,
        jobs: Arc<dyn JobStore>,
        popularity_oversampling: usize,
    ) -> Self {
        Self::new(vec![
            Box::new(PopularityWithDecay::new(views, popularity_oversampling)),
            Box::new(Recency::new(jobs)),
        ])
    }

    /// Fills up to `quota` jobs for `applier_id`, skipping `already_recommended`
    pub async fn fill(
        &self,
        applier_id: ApplierId,
        quota: usize,
        decay_factor: f64,
        already_recommended: &HashSet<JobId>,
    ) -> Vec<JobId> {
        let mut exclude = already_recommended.clone();
        let mut filled = Vec::with_capacity(quota);

        for tier in &self.tiers {
            if filled.len() >= quota {
                break;
            }

            let request = FillRequest {
                applier_id,
                quota: quota - filled.len(),
                decay_factor,
                exclude: &exclude,
            };

            let picked = match tier.fill(&request).await {
                Ok(picked) => picked,
                Err(e) => {
                    tracing::warn!(
                        applier_id = %applier_id,
                        tier = tier.name(),
                        error = %e,
                        "Fallback tier failed, moving to next tier"
                    );
                    continue;
                }
            };

            let remaining = quota - filled.len();
            let before = filled.len();
            for job_id in picked.into_iter().take(remaining) {
                if exclude.insert(job_id) {
                    filled.push(job_id);
                }
            }

            tracing::debug!(
                applier_id = %applier_id,
                tier = tier.name(),
                added = filled.len() - before,
                remaining = quota - filled.len(),
                "Fallback tier applied"
            );
        }

        filled
    }
}
