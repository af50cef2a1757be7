pub mod access_control;
pub mod access_release;
pub mod equipment;
pub mod sync_job;
