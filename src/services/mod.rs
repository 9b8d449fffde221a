pub mod aggregator;
pub mod cluster_assigner;
pub mod clustering;
pub mod fallback;
pub mod recommender;
pub mod scoring;
pub mod vectorizer;

pub use cluster_assigner::{ClusterAssigner, ClusteringSettings};
pub use fallback::{FallbackCascade, FillStrategy};
pub use recommender::{RecommendationService, RecommenderSettings};
