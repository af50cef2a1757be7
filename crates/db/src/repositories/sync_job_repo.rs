//! Repository for the `access_sync_jobs` table.
//!
//! The background worker only ever issues single-field updates here
//! (increment, append, set flag), so concurrent writers never overwrite
//! each other's progress.

use accessgate_core::sync::SyncError;
use accessgate_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::sync_job::{NewSyncJob, SyncJob, SyncJobListQuery};

const COLUMNS: &str = "\
    id, tenant_id, equipment_id, person_type_ids, total_docs, \
    executed_numbers, sync_errors, finished, end_date, created_at";

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 50;

pub struct SyncJobRepo;

impl SyncJobRepo {
    pub async fn create(pool: &PgPool, input: &NewSyncJob) -> Result<SyncJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_sync_jobs (tenant_id, equipment_id, person_type_ids, total_docs) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(input.tenant_id)
            .bind(input.equipment_id)
            .bind(&input.person_type_ids)
            .bind(input.total_docs)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<SyncJob>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_sync_jobs WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        params: &SyncJobListQuery,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM access_sync_jobs \
             WHERE tenant_id = $1 AND ($2::BIGINT IS NULL OR equipment_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, SyncJob>(&query)
            .bind(tenant_id)
            .bind(params.equipment_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Add `count` to `executed_numbers`.
    pub async fn increment_executed(
        pool: &PgPool,
        id: DbId,
        count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE access_sync_jobs SET executed_numbers = executed_numbers + $2 WHERE id = $1",
        )
        .bind(id)
        .bind(count)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Append one entry to `sync_errors`.
    pub async fn push_error(pool: &PgPool, id: DbId, error: &SyncError) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE access_sync_jobs SET sync_errors = sync_errors || $2 WHERE id = $1")
            .bind(id)
            .bind(Json(vec![error.clone()]))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Set `finished` and stamp `end_date`.
    pub async fn finish(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE access_sync_jobs SET finished = TRUE, end_date = NOW() \
             WHERE id = $1 AND finished = FALSE",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
