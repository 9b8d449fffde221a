use std::collections::{BTreeSet, HashMap};

use crate::{
    models::{ApplierId, JobId},
    services::aggregator::ViewCounts,
};

/// Normalised view vectors for every applier in one aggregation pass
///
/// Row `i` belongs to `applier_ids[i]`; column `j` to `job_ids[j]`. Each
/// component is `count / max_count`, where `max_count` is the single largest
/// per-(applier, job) count of the whole pass.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMatrix {
    pub applier_ids: Vec<ApplierId>,
    pub job_ids: Vec<JobId>,
    pub max_count: u64,
    pub rows: Vec<Vec<f64>>,
}

impl UserMatrix {
    pub fn n_appliers(&self) -> usize {
        self.applier_ids.len()
    }

    pub fn n_jobs(&self) -> usize {
        self.job_ids.len()
    }
}

/// Largest per-(applier, job) count in `counts`
pub fn max_count(counts: &ViewCounts) -> u64 {
    counts
        .values()
        .flat_map(|jobs| jobs.values().copied())
        .max()
        .unwrap_or(0)
}

/// Builds one normalised vector per applier over a shared job index
///
/// Returns `None` when there is no signal (no views at all), so callers can
/// skip clustering instead of handling an error.
pub fn vectorize(counts: &ViewCounts) -> Option<UserMatrix> {
    let max_count = max_count(counts);
    if max_count == 0 {
        return None;
    }

    let job_ids: Vec<JobId> = counts
        .values()
        .flat_map(|jobs| jobs.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let job_index: HashMap<JobId, usize> = job_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let scale = max_count as f64;
    let mut applier_ids = Vec::with_capacity(counts.len());
    let mut rows = Vec::with_capacity(counts.len());

    for (applier_id, jobs) in counts {
        let mut row = vec![0.0; job_ids.len()];
        for (job_id, count) in jobs {
            row[job_index[job_id]] = *count as f64 / scale;
        }
        applier_ids.push(*applier_id);
        rows.push(row);
    }

    tracing::debug!(
        appliers = applier_ids.len(),
        jobs = job_ids.len(),
        max_count,
        "Built user view vectors"
    );

    Some(UserMatrix {
        applier_ids,
        job_ids,
        max_count,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::JobViewCounts;
    use uuid::Uuid;

    fn counts(entries: &[(ApplierId, JobId, u64)]) -> ViewCounts {
        let mut counts = ViewCounts::new();
        for (applier, job, n) in entries {
            counts
                .entry(*applier)
                .or_insert_with(JobViewCounts::new)
                .insert(*job, *n);
        }
        counts
    }

    #[test]
    fn test_vectorize_normalizes_by_global_max() {
        let (a, b) = (Uuid::from_u128(10), Uuid::from_u128(20));
        let (job1, job2) = (Uuid::from_u128(1), Uuid::from_u128(2));

        let matrix = vectorize(&counts(&[(a, job1, 4), (a, job2, 1), (b, job1, 2)])).unwrap();

        assert_eq!(matrix.max_count, 4);
        assert_eq!(matrix.job_ids, vec![job1, job2]);
        assert_eq!(matrix.applier_ids, vec![a, b]);
        assert_eq!(matrix.rows[0], vec![1.0, 0.25]);
        // b's own max is 2, but normalisation is global
        assert_eq!(matrix.rows[1], vec![0.5, 0.0]);
    }

    #[test]
    fn test_vectorize_components_bounded_and_max_present() {
        let entries: Vec<(ApplierId, JobId, u64)> = (0..6u128)
            .flat_map(|u| {
                (0..5u128).map(move |j| {
                    let count = ((u * 7 + j * 3) % 9) as u64;
                    (Uuid::from_u128(u), Uuid::from_u128(100 + j), count)
                })
            })
            .filter(|(_, _, n)| *n > 0)
            .collect();

        let matrix = vectorize(&counts(&entries)).unwrap();

        let components: Vec<f64> = matrix.rows.iter().flatten().copied().collect();
        assert!(components.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(components.iter().any(|v| *v == 1.0));
        assert!(matrix.rows.iter().all(|row| row.len() == matrix.n_jobs()));
    }

    #[test]
    fn test_vectorize_is_deterministic() {
        let entries: Vec<(ApplierId, JobId, u64)> = (0..20)
            .map(|i| (Uuid::new_v4(), Uuid::new_v4(), (i % 4 + 1) as u64))
            .collect();
        let input = counts(&entries);

        let first = vectorize(&input).unwrap();
        let second = vectorize(&input).unwrap();

        assert_eq!(first, second);
        let mut sorted = first.job_ids.clone();
        sorted.sort();
        assert_eq!(first.job_ids, sorted);
    }

    #[test]
    fn test_vectorize_without_views_has_no_signal() {
        assert!(vectorize(&ViewCounts::new()).is_none());
    }
}
