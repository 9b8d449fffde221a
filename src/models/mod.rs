use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

mod applier;
mod job;
mod view;

pub use applier::{Applier, ClusterLabel, UNASSIGNED_SENTINEL};
pub use job::{JobPosting, JobScore};
pub use view::{NewViewEvent, ViewEvent};

pub type ApplierId = Uuid;
pub type JobId = Uuid;

pub const MAX_RECOMMENDATION_LIMIT: usize = 100;

/// Largest page of raw view events served per listing
pub const MAX_VIEW_LOG_LIMIT: usize = 1000;

// ============================================================================
// Request Parameters
// ============================================================================

/// Query string for `GET /recommendations/{applier_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
}

fn default_limit() -> usize {
    10
}

fn default_decay_factor() -> f64 {
    0.5
}

impl Default for RecommendationQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            decay_factor: default_decay_factor(),
        }
    }
}

impl RecommendationQuery {
    pub fn validate(&self) -> AppResult<()> {
        if self.limit == 0 || self.limit > MAX_RECOMMENDATION_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_RECOMMENDATION_LIMIT
            )));
        }
        if !(0.0..=1.0).contains(&self.decay_factor) {
            return Err(AppError::InvalidInput(
                "decay_factor must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query string for the density-based refresh
#[derive(Debug, Clone, Deserialize)]
pub struct DensityParams {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_epsilon() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    5
}

impl DensityParams {
    pub fn validate(&self) -> AppResult<()> {
        if !(self.epsilon > 0.0 && self.epsilon <= 1.0) {
            return Err(AppError::InvalidInput(
                "epsilon must be in (0, 1]".to_string(),
            ));
        }
        if self.min_samples == 0 {
            return Err(AppError::InvalidInput(
                "min_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query string for the partitional refresh
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionParams {
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
}

fn default_n_clusters() -> usize {
    5
}

impl PartitionParams {
    pub fn validate(&self) -> AppResult<()> {
        if self.n_clusters == 0 {
            return Err(AppError::InvalidInput(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query string for the view log listings
#[derive(Debug, Clone, Deserialize)]
pub struct ViewLogQuery {
    #[serde(default = "default_view_log_limit")]
    pub limit: usize,
}

fn default_view_log_limit() -> usize {
    100
}

impl ViewLogQuery {
    pub fn validate(&self) -> AppResult<()> {
        if self.limit == 0 || self.limit > MAX_VIEW_LOG_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_VIEW_LOG_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_query_defaults() {
        let query: RecommendationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 10);
        assert_eq!(query.decay_factor, 0.5);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_recommendation_query_rejects_out_of_range() {
        let zero = RecommendationQuery {
            limit: 0,
            decay_factor: 0.5,
        };
        assert!(zero.validate().is_err());

        let too_many = RecommendationQuery {
            limit: 101,
            decay_factor: 0.5,
        };
        assert!(too_many.validate().is_err());

        let steep = RecommendationQuery {
            limit: 10,
            decay_factor: 1.5,
        };
        assert!(steep.validate().is_err());
    }

    #[test]
    fn test_recommendation_query_accepts_bounds() {
        for (limit, decay_factor) in [(1, 0.0), (100, 1.0)] {
            let query = RecommendationQuery {
                limit,
                decay_factor,
            };
            assert!(query.validate().is_ok());
        }
    }

    #[test]
    fn test_density_params_validation() {
        let ok = DensityParams {
            epsilon: 1.0,
            min_samples: 1,
        };
        assert!(ok.validate().is_ok());

        let zero_eps = DensityParams {
            epsilon: 0.0,
            min_samples: 5,
        };
        assert!(zero_eps.validate().is_err());

        let zero_min = DensityParams {
            epsilon: 0.5,
            min_samples: 0,
        };
        assert!(zero_min.validate().is_err());
    }

    #[test]
    fn test_partition_params_validation() {
        assert!(PartitionParams { n_clusters: 1 }.validate().is_ok());
        assert!(PartitionParams { n_clusters: 0 }.validate().is_err());
    }

    #[test]
    fn test_view_log_query_bounds() {
        let query: ViewLogQuery = serde_json::from_str("{}").unwrap();
        assert!(query.validate().is_ok());

        for limit in [1, MAX_VIEW_LOG_LIMIT] {
            assert!(ViewLogQuery { limit }.validate().is_ok());
        }
        for limit in [0, MAX_VIEW_LOG_LIMIT + 1, usize::MAX] {
            assert!(ViewLogQuery { limit }.validate().is_err());
        }
    }
}
