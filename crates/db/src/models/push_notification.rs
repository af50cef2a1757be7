use accessgate_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `push_notifications` outbox table, drained by the
/// delivery service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushNotificationRow {
    pub id: DbId,
    pub tenant_id: DbId,
    pub recipient_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub delivered_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
