//! Equipment synchronization constants and job bookkeeping types.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Number of releases pushed to a device per batch.
pub const SYNC_BATCH_SIZE: usize = 25;

/// Default bound on a single equipment HTTP call.
pub const DEFAULT_EQUIPMENT_TIMEOUT_SECS: u64 = 10;

/// One failed device call recorded on a synchronization job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub equipment_id: DbId,
    pub equipment_ip: String,
    pub message: String,
}

/// Completion percentage of a job, clamped to `0..=100`.
pub fn progress_percent(executed: i32, total: i32) -> i16 {
    if total <= 0 {
        return 100;
    }
    ((i64::from(executed.max(0)) * 100 / i64::from(total)).min(100)) as i16
}
