use std::collections::HashMap;

use crate::models::{JobId, JobScore};

/// Multiplier applied to a job the applier has already viewed `view_count` times
///
/// `1 / (1 + view_count^decay_factor)` for seen jobs, exactly `1` for unseen
/// ones. Repeat views are discounted, never zeroed.
pub fn decay_weight(view_count: u64, decay_factor: f64) -> f64 {
    if view_count == 0 {
        1.0
    } else {
        1.0 / (1.0 + (view_count as f64).powf(decay_factor))
    }
}

/// Applies the applier's own view history to popularity counts
pub fn score_candidates(
    candidates: &[(JobId, u64)],
    personal_views: &HashMap<JobId, u64>,
    decay_factor: f64,
) -> Vec<JobScore> {
    candidates
        .iter()
        .map(|(job_id, popularity)| {
            let seen = personal_views.get(job_id).copied().unwrap_or(0);
            JobScore::new(*job_id, *popularity as f64 * decay_weight(seen, decay_factor))
        })
        .collect()
}

/// Highest score first, ties by job id; at most `limit` ids
pub fn rank(mut scores: Vec<JobScore>, limit: usize) -> Vec<JobId> {
    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    scores.into_iter().take(limit).map(|s| s.job_id).collect()
}
