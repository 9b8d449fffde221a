use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::{ApplierStore, ViewStore},
    models::{ApplierId, ClusterLabel},
    services::{
        aggregator::load_view_counts,
        clustering::{ClusteringError, Dbscan, KMeans},
        vectorizer::vectorize,
    },
};

/// Tunables for a clustering refresh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteringSettings {
    /// Hard cap on view events read per run
    pub event_load_cap: usize,
    pub kmeans_seed: u64,
    pub kmeans_max_iter: usize,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            event_load_cap: 100_000,
            kmeans_seed: 42,
            kmeans_max_iter: 300,
        }
    }
}

/// Recomputes applier cluster labels from view history
///
/// Each refresh is all-or-nothing up to the point of writing: no labels are
/// touched unless the clustering itself succeeded. Writes are then made one
/// applier at a time and a failed write only skips that applier. Appliers
/// holding a cluster id who no longer appear in the view history are reset
/// to unassigned, so no label outlives the run that produced it.
pub struct ClusterAssigner {
    views: Arc<dyn ViewStore>,
    appliers: Arc<dyn ApplierStore>,
    settings: ClusteringSettings,
}

impl ClusterAssigner {
    pub fn new(
        views: Arc<dyn ViewStore>,
        appliers: Arc<dyn ApplierStore>,
        settings: ClusteringSettings,
    ) -> Self {
        Self {
            views,
            appliers,
            settings,
        }
    }

    /// Density-based refresh over the cosine distance between view vectors
    ///
    /// Appliers outside every dense region are labelled unassigned.
    pub async fn assign_density_based(&self, radius: f64, min_neighbors: usize) -> bool {
        tracing::info!(radius, min_neighbors, "Starting density-based clustering");

        self.refresh("dbscan", move |rows| {
            let labels = Dbscan::new(radius, min_neighbors).fit(&rows)?;
            Ok(labels
                .into_iter()
                .map(|label| match label {
                    Some(id) => ClusterLabel::Cluster(id),
                    None => ClusterLabel::Unassigned,
                })
                .collect())
        })
        .await
    }

    /// Partitions view vectors into exactly `k` groups with the configured seed
    pub async fn assign_partitional(&self, k: usize) -> bool {
        tracing::info!(k, seed = self.settings.kmeans_seed, "Starting k-means clustering");

        let kmeans = KMeans::new(k)
            .with_seed(self.settings.kmeans_seed)
            .with_max_iter(self.settings.kmeans_max_iter);

        self.refresh("kmeans", move |rows| {
            Ok(kmeans
                .fit_predict(&rows)?
                .into_iter()
                .map(ClusterLabel::Cluster)
                .collect())
        })
        .await
    }

    async fn refresh<F>(&self, algorithm: &'static str, cluster: F) -> bool
    where
        F: FnOnce(Vec<Vec<f64>>) -> Result<Vec<ClusterLabel>, ClusteringError> + Send + 'static,
    {
        let start = Instant::now();

        // 1. Aggregate view events
        let loaded = load_view_counts(self.views.as_ref(), self.settings.event_load_cap).await;
        let counts = match loaded {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(algorithm, error = %e, "Failed to load view events");
                return false;
            }
        };

        // 2. Build normalised vectors
        let Some(matrix) = vectorize(&counts) else {
            tracing::warn!(algorithm, "No view data, skipping clustering");
            return false;
        };
        let applier_ids = matrix.applier_ids;

        // 3. Cluster off the async runtime
        let labels = match tokio::task::spawn_blocking(move || cluster(matrix.rows)).await {
            Ok(Ok(labels)) => labels,
            Ok(Err(e)) => {
                tracing::error!(algorithm, error = %e, "Clustering failed, labels left unchanged");
                return false;
            }
            Err(e) => {
                tracing::error!(algorithm, error = %e, "Clustering task aborted");
                return false;
            }
        };

        // 4. Persist one label per applier
        let mut failed = self.write_labels(&applier_ids, &labels).await;

        // 5. Unassign clustered appliers this run did not see
        let stale = self.stale_appliers(&applier_ids).await;
        let unassigned = vec![ClusterLabel::Unassigned; stale.len()];
        failed += self.write_labels(&stale, &unassigned).await;

        tracing::info!(
            algorithm,
            appliers = applier_ids.len(),
            clusters = count_clusters(&labels),
            unassigned = labels.iter().filter(|l| **l == ClusterLabel::Unassigned).count(),
            stale_reset = stale.len(),
            failed_writes = failed,
            elapsed_ms = start.elapsed().as_millis(),
            "Cluster labels refreshed"
        );

        true
    }

    async fn stale_appliers(&self, seen: &[ApplierId]) -> Vec<ApplierId> {
        let seen: HashSet<&ApplierId> = seen.iter().collect();
        match self.appliers.clustered_appliers().await {
            Ok(clustered) => clustered
                .into_iter()
                .filter(|id| !seen.contains(id))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list clustered appliers, stale labels kept");
                Vec::new()
            }
        }
    }

    async fn write_labels(&self, applier_ids: &[ApplierId], labels: &[ClusterLabel]) -> usize {
        let mut failed = 0;
        for (applier_id, label) in applier_ids.iter().zip(labels) {
            if let Err(e) = self.appliers.set_cluster_label(*applier_id, *label).await {
                failed += 1;
                tracing::warn!(
                    applier_id = %applier_id,
                    label = ?label,
                    error = %e,
                    "Failed to write cluster label"
                );
            }
        }
        failed
    }
}

fn count_clusters(labels: &[ClusterLabel]) -> usize {
    let mut ids: Vec<u32> = labels.iter().filter_map(|l| l.cluster_id()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}
