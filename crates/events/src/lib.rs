//! Push-notification plumbing.
//!
//! - [`NotificationBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`; implements
//!   [`PushNotifier`](accessgate_core::directory::PushNotifier) so the
//!   lifecycle engine can fire and forget.
//! - [`NotificationPersistence`]: background service that writes every
//!   published notification to the `push_notifications` outbox for the
//!   delivery service.

pub mod bus;
pub mod persistence;

pub use bus::NotificationBus;
pub use persistence::NotificationPersistence;
