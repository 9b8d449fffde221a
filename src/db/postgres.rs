use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    db::repository::{ApplierStore, JobStore, ViewStore},
    error::{AppError, AppResult},
    models::{Applier, ApplierId, ClusterLabel, JobId, JobPosting, NewViewEvent, ViewEvent},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the schema in `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(FromRow)]
struct ViewRow {
    id: Uuid,
    applier_id: Uuid,
    job_id: Uuid,
    viewed_at: DateTime<Utc>,
}

impl From<ViewRow> for ViewEvent {
    fn from(row: ViewRow) -> Self {
        ViewEvent {
            id: row.id,
            applier_id: row.applier_id,
            job_id: row.job_id,
            viewed_at: row.viewed_at,
        }
    }
}

#[derive(FromRow)]
struct CountRow {
    job_id: Uuid,
    view_count: i64,
}

fn into_counts(rows: Vec<CountRow>) -> Vec<(JobId, u64)> {
    rows.into_iter()
        .map(|row| (row.job_id, row.view_count.max(0) as u64))
        .collect()
}

/// PostgreSQL-backed implementation of the three store traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ViewStore for PgStore {
    async fn record_view(&self, event: NewViewEvent) -> AppResult<ViewEvent> {
        let event = event.into_event();

        sqlx::query(
            "INSERT INTO log_views (id, applier_id, job_id, viewed_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(event.id)
        .bind(event.applier_id)
        .bind(event.job_id)
        .bind(event.viewed_at)
        .execute(&self.pool)
        .await?;

        Ok(event)
    }

    async fn load_events(&self, cap: usize) -> AppResult<Vec<ViewEvent>> {
        let rows: Vec<ViewRow> = sqlx::query_as(
            "SELECT id, applier_id, job_id, viewed_at
             FROM log_views
             ORDER BY viewed_at DESC, id ASC
             LIMIT $1",
        )
        .bind(cap as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ViewEvent::from).collect())
    }

    async fn views_by_applier(
        &self,
        applier_id: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ViewEvent>> {
        let rows: Vec<ViewRow> = sqlx::query_as(
            "SELECT id, applier_id, job_id, viewed_at
             FROM log_views
             WHERE applier_id = $1
             ORDER BY viewed_at DESC, id ASC
             LIMIT $2",
        )
        .bind(applier_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ViewEvent::from).collect())
    }

    async fn views_by_job(&self, job_id: JobId, limit: usize) -> AppResult<Vec<ViewEvent>> {
        let rows: Vec<ViewRow> = sqlx::query_as(
            "SELECT id, applier_id, job_id, viewed_at
             FROM log_views
             WHERE job_id = $1
             ORDER BY viewed_at DESC, id ASC
             LIMIT $2",
        )
        .bind(job_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ViewEvent::from).collect())
    }

    async fn applier_view_counts(&self, applier_id: ApplierId) -> AppResult<HashMap<JobId, u64>> {
        let rows: Vec<CountRow> = sqlx::query_as(
            "SELECT job_id, COUNT(*) AS view_count
             FROM log_views
             WHERE applier_id = $1
             GROUP BY job_id",
        )
        .bind(applier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_counts(rows).into_iter().collect())
    }

    async fn peer_job_counts(
        &self,
        appliers: &[ApplierId],
        min_views: u64,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>> {
        if appliers.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<CountRow> = sqlx::query_as(
            "SELECT v.job_id, COUNT(*) AS view_count
             FROM log_views v
             JOIN jobs j ON j.id = v.job_id
             WHERE v.applier_id = ANY($1)
             GROUP BY v.job_id
             HAVING COUNT(*) >= $2
             ORDER BY view_count DESC, v.job_id ASC
             LIMIT $3",
        )
        .bind(appliers)
        .bind(min_views as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_counts(rows))
    }

    async fn global_job_counts(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<(JobId, u64)>> {
        let excluded: Vec<Uuid> = exclude.iter().copied().collect();

        let rows: Vec<CountRow> = sqlx::query_as(
            "SELECT v.job_id, COUNT(*) AS view_count
             FROM log_views v
             JOIN jobs j ON j.id = v.job_id
             WHERE NOT (v.job_id = ANY($1))
             GROUP BY v.job_id
             ORDER BY view_count DESC, v.job_id ASC
             LIMIT $2",
        )
        .bind(&excluded)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_counts(rows))
    }
}

#[async_trait]
impl ApplierStore for PgStore {
    async fn find_applier(&self, applier_id: ApplierId) -> AppResult<Option<Applier>> {
        let row: Option<(Uuid, Option<i32>)> =
            sqlx::query_as("SELECT id, cluster_id FROM appliers WHERE id = $1")
                .bind(applier_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, cluster_id)| Applier {
            id,
            cluster: ClusterLabel::from_db(cluster_id),
        }))
    }

    async fn cluster_peers(
        &self,
        cluster_id: u32,
        exclude: ApplierId,
        limit: usize,
    ) -> AppResult<Vec<ApplierId>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM appliers
             WHERE cluster_id = $1 AND id <> $2
             ORDER BY id
             LIMIT $3",
        )
        .bind(cluster_id as i32)
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn clustered_appliers(&self) -> AppResult<Vec<ApplierId>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM appliers WHERE cluster_id >= 0 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_cluster_label(
        &self,
        applier_id: ApplierId,
        label: ClusterLabel,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE appliers SET cluster_id = $2 WHERE id = $1")
            .bind(applier_id)
            .bind(label.to_db())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("applier {}", applier_id)));
        }

        Ok(())
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn recent_jobs(
        &self,
        exclude: &HashSet<JobId>,
        limit: usize,
    ) -> AppResult<Vec<JobPosting>> {
        let excluded: Vec<Uuid> = exclude.iter().copied().collect();

        let rows: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, created_at FROM jobs
             WHERE NOT (id = ANY($1))
             ORDER BY created_at DESC, id ASC
             LIMIT $2",
        )
        .bind(&excluded)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at)| JobPosting { id, created_at })
            .collect())
    }
}
