//! Postgres-backed collaborator lookups.
//!
//! Reads the people / access point / equipment / work schedule read models
//! and exposes them through the capability traits in
//! [`accessgate_core::directory`].

use accessgate_core::directory::{
    AccessPoint, AccessPointLookup, Equipment, EquipmentLookup, Person, PersonLookup,
    WorkSchedule, WorkScheduleLookup,
};
use accessgate_core::error::CoreError;
use accessgate_core::types::DbId;
use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::{FromRow, PgPool};

const PERSON_QUERY: &str = "\
    SELECT p.id, p.tenant_id, p.person_type_id, pt.name AS person_type_name, \
           p.name, p.code, p.picture_url, p.category \
    FROM people p \
    LEFT JOIN person_types pt ON pt.id = p.person_type_id \
    WHERE p.id = $1 AND p.tenant_id = $2 AND p.deleted_at IS NULL";

const ACCESS_POINT_SELECT: &str = "\
    SELECT ap.id, ap.tenant_id, ap.name, ap.area_id, a.name AS area_name, ap.general_exit, \
           ARRAY(SELECT ape.equipment_id FROM access_point_equipment ape \
                 WHERE ape.access_point_id = ap.id ORDER BY ape.equipment_id) AS equipment_ids \
    FROM access_points ap \
    JOIN areas a ON a.id = ap.area_id";

const WORK_SCHEDULE_COLUMNS: &str =
    "id, tenant_id, code, name, days, start_time, end_time";

#[derive(FromRow)]
struct PersonRow {
    id: DbId,
    tenant_id: DbId,
    person_type_id: DbId,
    person_type_name: Option<String>,
    name: String,
    code: Option<String>,
    picture_url: Option<String>,
    category: Option<String>,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            person_type_id: row.person_type_id,
            person_type_name: row.person_type_name,
            name: row.name,
            code: row.code,
            picture_url: row.picture_url,
            category: row.category,
        }
    }
}

#[derive(FromRow)]
struct AccessPointRow {
    id: DbId,
    tenant_id: DbId,
    name: String,
    area_id: DbId,
    area_name: String,
    general_exit: bool,
    equipment_ids: Vec<DbId>,
}

impl From<AccessPointRow> for AccessPoint {
    fn from(row: AccessPointRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            area_id: row.area_id,
            area_name: row.area_name,
            general_exit: row.general_exit,
            equipment_ids: row.equipment_ids,
        }
    }
}

#[derive(FromRow)]
struct EquipmentRow {
    id: DbId,
    tenant_id: DbId,
    name: String,
    ip: String,
}

#[derive(FromRow)]
struct WorkScheduleRow {
    id: DbId,
    tenant_id: DbId,
    code: i32,
    name: String,
    days: Vec<i16>,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl From<WorkScheduleRow> for WorkSchedule {
    fn from(row: WorkScheduleRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            code: row.code,
            name: row.name,
            days: row.days,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

fn internal(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Directory lookup failed");
    CoreError::Internal(format!("Directory lookup failed: {err}"))
}

/// Implements every collaborator lookup over one connection pool.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonLookup for PgDirectory {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Person>, CoreError> {
        sqlx::query_as::<_, PersonRow>(PERSON_QUERY)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Person::from))
            .map_err(internal)
    }
}

#[async_trait]
impl AccessPointLookup for PgDirectory {
    async fn find_by_id(
        &self,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessPoint>, CoreError> {
        let query = format!("{ACCESS_POINT_SELECT} WHERE ap.id = $1 AND ap.tenant_id = $2");
        sqlx::query_as::<_, AccessPointRow>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(AccessPoint::from))
            .map_err(internal)
    }

    async fn find_all_by_person_type_id(
        &self,
        person_type_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError> {
        let query = format!(
            "{ACCESS_POINT_SELECT} \
             JOIN person_type_access_points ptap ON ptap.access_point_id = ap.id \
             WHERE ptap.person_type_id = $1 AND ap.tenant_id = $2 \
             ORDER BY ap.id"
        );
        sqlx::query_as::<_, AccessPointRow>(&query)
            .bind(person_type_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(AccessPoint::from).collect())
            .map_err(internal)
    }

    async fn find_all_by_area_id(
        &self,
        area_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError> {
        let query = format!(
            "{ACCESS_POINT_SELECT} WHERE ap.area_id = $1 AND ap.tenant_id = $2 ORDER BY ap.id"
        );
        sqlx::query_as::<_, AccessPointRow>(&query)
            .bind(area_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(AccessPoint::from).collect())
            .map_err(internal)
    }
}

#[async_trait]
impl EquipmentLookup for PgDirectory {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Equipment>, CoreError> {
        sqlx::query_as::<_, EquipmentRow>(
            "SELECT id, tenant_id, name, ip FROM equipment WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| {
            row.map(|r| Equipment {
                id: r.id,
                tenant_id: r.tenant_id,
                name: r.name,
                ip: r.ip,
            })
        })
        .map_err(internal)
    }
}

#[async_trait]
impl WorkScheduleLookup for PgDirectory {
    async fn find_all(&self, tenant_id: DbId) -> Result<Vec<WorkSchedule>, CoreError> {
        let query = format!(
            "SELECT {WORK_SCHEDULE_COLUMNS} FROM work_schedules WHERE tenant_id = $1 ORDER BY code"
        );
        sqlx::query_as::<_, WorkScheduleRow>(&query)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(WorkSchedule::from).collect())
            .map_err(internal)
    }

    async fn find_by_code(
        &self,
        code: i32,
        tenant_id: DbId,
    ) -> Result<Option<WorkSchedule>, CoreError> {
        let query = format!(
            "SELECT {WORK_SCHEDULE_COLUMNS} FROM work_schedules WHERE code = $1 AND tenant_id = $2"
        );
        sqlx::query_as::<_, WorkScheduleRow>(&query)
            .bind(code)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(WorkSchedule::from))
            .map_err(internal)
    }
}
