//! Repository for the `access_releases` table.
//!
//! Every status change is a single conditional `UPDATE` that also appends
//! its audit action, so a repeated or losing transition matches zero rows
//! and leaves the record untouched.

use accessgate_core::release::ReleaseAction;
use accessgate_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::access_release::{AccessRelease, NewAccessRelease, ReleaseListQuery};
use crate::models::status::{ReleaseStatus, StatusId};

/// Column list for `access_releases` queries.
const COLUMNS: &str = "\
    id, tenant_id, person_id, person_type_id, responsible_id, area_ids, \
    access_point_id, release_type, status_id, init_date, end_date, \
    single_access, work_schedule_codes, invitation_id, actions, \
    deleted_at, created_at, updated_at";

/// Name of the partial unique index guarding the one-active invariant.
pub const ONE_ACTIVE_CONSTRAINT: &str = "uq_access_releases_one_active";

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 50;

/// Result of [`AccessReleaseRepo::create_scheduled`].
#[derive(Debug)]
pub enum CreateOutcome {
    Created(AccessRelease),
    /// The person already holds this active release; nothing was written.
    ActiveExists(DbId),
}

pub struct AccessReleaseRepo;

impl AccessReleaseRepo {
    /// Insert a `scheduled` release inside a transaction.
    ///
    /// A per-(tenant, person) advisory lock serializes concurrent creations
    /// for the same person, and the active-release check is repeated under
    /// that lock.
    pub async fn create_scheduled(
        pool: &PgPool,
        input: &NewAccessRelease,
    ) -> Result<CreateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended(format('release:%s:%s', $1, $2), 0))")
            .bind(input.tenant_id)
            .bind(input.person_id)
            .execute(&mut *tx)
            .await?;

        let active: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM access_releases \
             WHERE tenant_id = $1 AND person_id = $2 AND status_id = $3",
        )
        .bind(input.tenant_id)
        .bind(input.person_id)
        .bind(ReleaseStatus::Active.id())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(active_id) = active {
            tx.rollback().await?;
            return Ok(CreateOutcome::ActiveExists(active_id));
        }

        let query = format!(
            "INSERT INTO access_releases \
                (tenant_id, person_id, person_type_id, responsible_id, area_ids, \
                 access_point_id, release_type, status_id, init_date, end_date, \
                 single_access, work_schedule_codes, invitation_id, actions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        );
        let release = sqlx::query_as::<_, AccessRelease>(&query)
            .bind(input.tenant_id)
            .bind(input.person_id)
            .bind(input.person_type_id)
            .bind(input.responsible_id)
            .bind(&input.area_ids)
            .bind(input.access_point_id)
            .bind(&input.release_type)
            .bind(ReleaseStatus::Scheduled.id())
            .bind(input.init_date)
            .bind(input.end_date)
            .bind(input.single_access)
            .bind(&input.work_schedule_codes)
            .bind(input.invitation_id)
            .bind(Json(vec![input.created.clone()]))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CreateOutcome::Created(release))
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM access_releases WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Lookup without tenant scoping, for scheduler-driven transitions.
    pub async fn find_by_id_unscoped(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM access_releases WHERE id = $1");
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_active_for_person(
        pool: &PgPool,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE tenant_id = $1 AND person_id = $2 AND status_id = $3"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(tenant_id)
            .bind(person_id)
            .bind(ReleaseStatus::Active.id())
            .fetch_optional(pool)
            .await
    }

    /// Scheduled and active releases for a person, oldest first.
    pub async fn list_open_for_person(
        pool: &PgPool,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE tenant_id = $1 AND person_id = $2 AND status_id IN ($3, $4) \
             ORDER BY init_date ASC"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(tenant_id)
            .bind(person_id)
            .bind(ReleaseStatus::Scheduled.id())
            .bind(ReleaseStatus::Active.id())
            .fetch_all(pool)
            .await
    }

    /// List releases for a tenant, newest first. Deleted releases are
    /// only returned when explicitly filtered for.
    pub async fn list(
        pool: &PgPool,
        tenant_id: DbId,
        params: &ReleaseListQuery,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE tenant_id = $1 \
               AND ($2::BIGINT IS NULL OR person_id = $2) \
               AND (($3::SMALLINT IS NULL AND status_id <> $4) OR status_id = $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(tenant_id)
            .bind(params.person_id)
            .bind(params.status_id)
            .bind(ReleaseStatus::Deleted.id())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move a release from `from` to `to`, appending `action` atomically.
    ///
    /// Returns `None` when the release is no longer in `from` (already
    /// transitioned by a concurrent timer, sweep, or request).
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: StatusId,
        to: StatusId,
        action: &ReleaseAction,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        let query = format!(
            "UPDATE access_releases \
             SET status_id = $3, \
                 actions = actions || $4, \
                 deleted_at = CASE WHEN $3 = $5 THEN NOW() ELSE deleted_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(Json(vec![action.clone()]))
            .bind(ReleaseStatus::Deleted.id())
            .fetch_optional(pool)
            .await
    }

    /// Scheduled releases whose `init_date` is before `before`.
    pub async fn list_due_activations(
        pool: &PgPool,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE status_id = $1 AND init_date < $2 \
             ORDER BY init_date ASC"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(ReleaseStatus::Scheduled.id())
            .bind(before)
            .fetch_all(pool)
            .await
    }

    /// Scheduled or active releases whose `end_date` is before `before`.
    pub async fn list_due_expirations(
        pool: &PgPool,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE status_id IN ($1, $2) AND end_date < $3 \
             ORDER BY end_date ASC"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(ReleaseStatus::Scheduled.id())
            .bind(ReleaseStatus::Active.id())
            .bind(before)
            .fetch_all(pool)
            .await
    }

    /// Active releases held by people of the given person types.
    pub async fn list_active_by_person_types(
        pool: &PgPool,
        tenant_id: DbId,
        person_type_ids: &[DbId],
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_releases \
             WHERE tenant_id = $1 AND status_id = $2 AND person_type_id = ANY($3) \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, AccessRelease>(&query)
            .bind(tenant_id)
            .bind(ReleaseStatus::Active.id())
            .bind(person_type_ids)
            .fetch_all(pool)
            .await
    }
}
