//! Access release entity and DTOs.

use accessgate_core::release::{state_machine, ReleaseAction};
use accessgate_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `access_releases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessRelease {
    pub id: DbId,
    pub tenant_id: DbId,
    pub person_id: DbId,
    pub person_type_id: DbId,
    pub responsible_id: Option<DbId>,
    pub area_ids: Vec<DbId>,
    pub access_point_id: Option<DbId>,
    pub release_type: String,
    pub status_id: StatusId,
    pub init_date: Timestamp,
    pub end_date: Timestamp,
    pub single_access: bool,
    pub work_schedule_codes: Vec<i32>,
    pub invitation_id: Option<DbId>,
    pub actions: Json<Vec<ReleaseAction>>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AccessRelease {
    pub fn is_active(&self) -> bool {
        self.status_id == state_machine::ACTIVE
    }

    pub fn is_scheduled(&self) -> bool {
        self.status_id == state_machine::SCHEDULED
    }
}

/// Fully resolved insert DTO. Defaults are applied by the lifecycle engine
/// before this is built.
#[derive(Debug, Clone)]
pub struct NewAccessRelease {
    pub tenant_id: DbId,
    pub person_id: DbId,
    pub person_type_id: DbId,
    pub responsible_id: Option<DbId>,
    pub area_ids: Vec<DbId>,
    pub access_point_id: Option<DbId>,
    pub release_type: String,
    pub init_date: Timestamp,
    pub end_date: Timestamp,
    pub single_access: bool,
    pub work_schedule_codes: Vec<i32>,
    pub invitation_id: Option<DbId>,
    pub created: ReleaseAction,
}

/// Query parameters for `GET /api/v1/access-releases`.
#[derive(Debug, Default, Deserialize)]
pub struct ReleaseListQuery {
    pub person_id: Option<DbId>,
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
