//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod access_control_repo;
pub mod access_release_repo;
pub mod push_notification_repo;
pub mod sync_job_repo;

pub use access_control_repo::AccessControlRepo;
pub use access_release_repo::{AccessReleaseRepo, CreateOutcome};
pub use push_notification_repo::PushNotificationRepo;
pub use sync_job_repo::SyncJobRepo;
