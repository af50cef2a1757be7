//! HTTP client for the third-party access controller bridge.
//!
//! Every biometric/RFID controller is addressed by IP through a single
//! vendor bridge service. This crate wraps that bridge's REST API and
//! exposes it behind the [`EquipmentGateway`] trait so the sync worker can
//! be exercised against fakes.

pub mod api;
pub mod gateway;
pub mod messages;

pub use api::{EquipmentApi, EquipmentError};
pub use gateway::EquipmentGateway;
