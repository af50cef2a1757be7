//! Durable notification outbox writer.
//!
//! [`NotificationPersistence`] subscribes to the
//! [`NotificationBus`](crate::bus::NotificationBus) and writes every
//! notification to the `push_notifications` table. It shuts down when the
//! bus sender is dropped.

use accessgate_core::directory::PushNotification;
use accessgate_db::repositories::PushNotificationRepo;
use accessgate_db::DbPool;
use tokio::sync::broadcast;

pub struct NotificationPersistence;

impl NotificationPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<PushNotification>) {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    if let Err(e) = PushNotificationRepo::insert(&pool, &notification).await {
                        tracing::error!(
                            error = %e,
                            kind = %notification.kind,
                            recipient_id = notification.recipient_id,
                            "Failed to persist push notification"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Notification persistence lagged, some notifications were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use accessgate_db::repositories::PushNotificationRepo;
    use sqlx::PgPool;

    use super::*;
    use crate::bus::NotificationBus;

    #[sqlx::test(migrations = "../../db/migrations")]
    async fn published_notifications_land_in_outbox(pool: PgPool) {
        let bus = NotificationBus::default();
        let handle = tokio::spawn(NotificationPersistence::run(pool.clone(), bus.subscribe()));

        bus.publish(PushNotification {
            kind: "invite.fulfilled".into(),
            tenant_id: 1,
            recipient_id: 42,
            title: "Invitation accepted".into(),
            body: "Your guest is cleared for entry".into(),
            payload: serde_json::json!({"release_id": 5}),
        });
        drop(bus);
        handle.await.unwrap();

        let pending = PushNotificationRepo::list_pending_for_recipient(&pool, 1, 42)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, "invite.fulfilled");
        assert_eq!(pending[0].payload["release_id"], 5);
    }
}
