//! Repository for the `push_notifications` outbox.

use accessgate_core::directory::PushNotification;
use accessgate_core::types::DbId;
use sqlx::PgPool;

use crate::models::push_notification::PushNotificationRow;

const COLUMNS: &str =
    "id, tenant_id, recipient_id, kind, title, body, payload, delivered_at, created_at";

pub struct PushNotificationRepo;

impl PushNotificationRepo {
    /// Queue a notification for delivery, returning the generated ID.
    pub async fn insert(pool: &PgPool, notification: &PushNotification) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO push_notifications (tenant_id, recipient_id, kind, title, body, payload) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(notification.tenant_id)
        .bind(notification.recipient_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.payload)
        .fetch_one(pool)
        .await
    }

    /// Undelivered notifications for a recipient, oldest first.
    pub async fn list_pending_for_recipient(
        pool: &PgPool,
        tenant_id: DbId,
        recipient_id: DbId,
    ) -> Result<Vec<PushNotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM push_notifications \
             WHERE tenant_id = $1 AND recipient_id = $2 AND delivered_at IS NULL \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, PushNotificationRow>(&query)
            .bind(tenant_id)
            .bind(recipient_id)
            .fetch_all(pool)
            .await
    }
}
