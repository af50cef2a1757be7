//! In-process notification bus backed by a `tokio::sync::broadcast` channel.

use accessgate_core::directory::{PushNotification, PushNotifier};
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for [`PushNotification`]s.
///
/// Designed to be shared via `Arc<NotificationBus>`.
pub struct NotificationBus {
    sender: broadcast::Sender<PushNotification>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// If there are no active subscribers the notification is dropped.
    pub fn publish(&self, notification: PushNotification) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushNotification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PushNotifier for NotificationBus {
    fn notify(&self, notification: PushNotification) {
        tracing::debug!(
            kind = %notification.kind,
            recipient_id = notification.recipient_id,
            "Publishing push notification"
        );
        self.publish(notification);
    }
}
