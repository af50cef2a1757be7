//! Equipment synchronization job entity (progress/observability record).

use accessgate_core::sync::{progress_percent, SyncError};
use accessgate_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `access_sync_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncJob {
    pub id: DbId,
    pub tenant_id: DbId,
    pub equipment_id: DbId,
    pub person_type_ids: Vec<DbId>,
    pub total_docs: i32,
    pub executed_numbers: i32,
    pub sync_errors: Json<Vec<SyncError>>,
    pub finished: bool,
    pub end_date: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl SyncJob {
    pub fn progress_percent(&self) -> i16 {
        progress_percent(self.executed_numbers, self.total_docs)
    }
}

#[derive(Debug, Clone)]
pub struct NewSyncJob {
    pub tenant_id: DbId,
    pub equipment_id: DbId,
    pub person_type_ids: Vec<DbId>,
    pub total_docs: i32,
}

/// Query parameters for `GET /api/v1/sync-jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncJobListQuery {
    pub equipment_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
