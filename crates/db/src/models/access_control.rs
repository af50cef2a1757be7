//! Entry/exit record entity. Records are immutable once written.

use accessgate_core::access_control::{AccessPointSnapshot, PersonSnapshot};
use accessgate_core::release::ReleaseAction;
use accessgate_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `access_controls` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessControl {
    pub id: DbId,
    pub tenant_id: DbId,
    pub release_id: DbId,
    pub person: Json<PersonSnapshot>,
    pub access_point: Json<AccessPointSnapshot>,
    pub responsible: Option<Json<PersonSnapshot>>,
    pub direction: String,
    pub observation: Option<String>,
    pub actions: Json<Vec<ReleaseAction>>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewAccessControl {
    pub tenant_id: DbId,
    pub release_id: DbId,
    pub person: PersonSnapshot,
    pub access_point: AccessPointSnapshot,
    pub responsible: Option<PersonSnapshot>,
    pub direction: String,
    pub observation: Option<String>,
    pub created: ReleaseAction,
}

/// Query parameters for `GET /api/v1/access-controls`.
#[derive(Debug, Default, Deserialize)]
pub struct AccessControlListQuery {
    pub release_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
