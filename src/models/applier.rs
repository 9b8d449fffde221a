use serde::{Deserialize, Serialize};

use super::ApplierId;

/// Database sentinel for "clustered, but not in any dense region"
pub const UNASSIGNED_SENTINEL: i32 = -1;

/// Cluster membership written by the cluster assigner
///
/// `Unassigned` is distinct from `Cluster(0)`: it marks an applier the last
/// clustering run saw but could not place in any group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    Cluster(u32),
    Unassigned,
}

impl ClusterLabel {
    /// Column encoding: `-1` for unassigned, the cluster id otherwise
    pub fn to_db(self) -> i32 {
        match self {
            ClusterLabel::Cluster(id) => id as i32,
            ClusterLabel::Unassigned => UNASSIGNED_SENTINEL,
        }
    }

    /// Decodes the nullable column. `None` means the applier was never clustered.
    pub fn from_db(value: Option<i32>) -> Option<Self> {
        value.map(|v| {
            if v < 0 {
                ClusterLabel::Unassigned
            } else {
                ClusterLabel::Cluster(v as u32)
            }
        })
    }

    /// The numeric id when the applier belongs to a cluster
    pub fn cluster_id(self) -> Option<u32> {
        match self {
            ClusterLabel::Cluster(id) => Some(id),
            ClusterLabel::Unassigned => None,
        }
    }
}

/// The slice of an applier record the recommender cares about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applier {
    pub id: ApplierId,
    pub cluster: Option<ClusterLabel>,
}

impl Applier {
    pub fn new(id: ApplierId) -> Self {
        Self { id, cluster: None }
    }

    pub fn with_cluster(mut self, label: ClusterLabel) -> Self {
        self.cluster = Some(label);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_label_db_encoding() {
        assert_eq!(ClusterLabel::Cluster(0).to_db(), 0);
        assert_eq!(ClusterLabel::Cluster(7).to_db(), 7);
        assert_eq!(ClusterLabel::Unassigned.to_db(), UNASSIGNED_SENTINEL);
    }

    #[test]
    fn test_cluster_label_db_decoding() {
        assert_eq!(ClusterLabel::from_db(None), None);
        assert_eq!(ClusterLabel::from_db(Some(-1)), Some(ClusterLabel::Unassigned));
        assert_eq!(ClusterLabel::from_db(Some(0)), Some(ClusterLabel::Cluster(0)));
    }

    #[test]
    fn test_unassigned_is_not_cluster_zero() {
        assert_ne!(ClusterLabel::Unassigned, ClusterLabel::Cluster(0));
        assert_eq!(ClusterLabel::Unassigned.cluster_id(), None);
        assert_eq!(ClusterLabel::Cluster(0).cluster_id(), Some(0));
    }

    #[test]
    fn test_cluster_label_serialization() {
        let json = serde_json::to_string(&ClusterLabel::Unassigned).unwrap();
        assert_eq!(json, "\"unassigned\"");

        let json = serde_json::to_string(&ClusterLabel::Cluster(2)).unwrap();
        assert_eq!(json, r#"{"cluster":2}"#);
    }
}
