use async_trait::async_trait;

use crate::api::EquipmentError;
use crate::messages::{
    AddAccessRequest, RemoveAccessRequest, WeekPlanTemplateRequest, WorkScheduleRequest,
};

/// Commands the lifecycle engine sends to access controllers.
///
/// Implemented by [`EquipmentApi`](crate::api::EquipmentApi) in production
/// and by in-memory fakes in tests.
#[async_trait]
pub trait EquipmentGateway: Send + Sync {
    async fn add_access(&self, request: &AddAccessRequest) -> Result<(), EquipmentError>;

    async fn remove_access(&self, request: &RemoveAccessRequest) -> Result<(), EquipmentError>;

    async fn add_week_plan_template(
        &self,
        request: &WeekPlanTemplateRequest,
    ) -> Result<(), EquipmentError>;

    async fn add_work_schedule(&self, request: &WorkScheduleRequest) -> Result<(), EquipmentError>;

    /// Confirm a device IP is reachable before accepting it.
    async fn health_check(&self, ip: &str) -> Result<(), EquipmentError>;
}
