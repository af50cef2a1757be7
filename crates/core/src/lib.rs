//! Domain rules for access releases and equipment synchronization.
//!
//! This crate has no internal dependencies so the repository layer, the
//! equipment client and the API server can all share it.

pub mod access_control;
pub mod directory;
pub mod error;
pub mod release;
pub mod scheduling;
pub mod sync;
pub mod types;
