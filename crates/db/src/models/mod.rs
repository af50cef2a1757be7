//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - An insert DTO built by the lifecycle engine
//! - List query parameters where the resource is listable

pub mod access_control;
pub mod access_release;
pub mod push_notification;
pub mod status;
pub mod sync_job;
