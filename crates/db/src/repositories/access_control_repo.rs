//! Repository for the append-only `access_controls` table.
//!
//! Only inserts and reads exist; records are never updated or deleted.

use accessgate_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::access_control::{AccessControl, AccessControlListQuery, NewAccessControl};

const COLUMNS: &str = "\
    id, tenant_id, release_id, person, access_point, responsible, \
    direction, observation, actions, created_at";

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 50;

pub struct AccessControlRepo;

impl AccessControlRepo {
    pub async fn create(
        pool: &PgPool,
        input: &NewAccessControl,
    ) -> Result<AccessControl, sqlx::Error> {
        let query = format!(
            "INSERT INTO access_controls \
                (tenant_id, release_id, person, access_point, responsible, \
                 direction, observation, actions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccessControl>(&query)
            .bind(input.tenant_id)
            .bind(input.release_id)
            .bind(Json(&input.person))
            .bind(Json(&input.access_point))
            .bind(input.responsible.as_ref().map(Json))
            .bind(&input.direction)
            .bind(&input.observation)
            .bind(Json(vec![input.created.clone()]))
            .fetch_one(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        params: &AccessControlListQuery,
    ) -> Result<Vec<AccessControl>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM access_controls \
             WHERE tenant_id = $1 AND ($2::BIGINT IS NULL OR release_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, AccessControl>(&query)
            .bind(tenant_id)
            .bind(params.release_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
