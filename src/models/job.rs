use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// Job posting metadata used for ordering (recency fallback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub created_at: DateTime<Utc>,
}

/// A scored candidate. Scores are only comparable within one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobScore {
    pub job_id: JobId,
    pub score: f64,
}

impl JobScore {
    pub fn new(job_id: JobId, score: f64) -> Self {
        Self { job_id, score }
    }
}
