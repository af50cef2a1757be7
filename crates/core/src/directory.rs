//! Capability interfaces for the collaborators this service consumes.
//!
//! People, access points, equipment and work schedules are managed
//! elsewhere. The lifecycle engine only needs to look them up, so each
//! concern is a narrow trait resolved once at process start.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: DbId,
    pub tenant_id: DbId,
    pub person_type_id: DbId,
    pub person_type_name: Option<String>,
    pub name: String,
    /// Badge/enrollment code known to the equipment.
    pub code: Option<String>,
    pub picture_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub area_id: DbId,
    pub area_name: String,
    /// Universally open exit. Revocation skips its equipment.
    pub general_exit: bool,
    pub equipment_ids: Vec<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSchedule {
    pub id: DbId,
    pub tenant_id: DbId,
    pub code: i32,
    pub name: String,
    /// ISO weekdays, 1 = Monday.
    pub days: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A push notification handed to the delivery service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub kind: String,
    pub tenant_id: DbId,
    pub recipient_id: DbId,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

pub const PUSH_ACCESS_ENTRY: &str = "access.entry";
pub const PUSH_INVITE_FULFILLED: &str = "invite.fulfilled";

#[async_trait]
pub trait PersonLookup: Send + Sync {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Person>, CoreError>;
}

#[async_trait]
pub trait AccessPointLookup: Send + Sync {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId)
        -> Result<Option<AccessPoint>, CoreError>;

    /// Access points a person type is entitled to pass.
    async fn find_all_by_person_type_id(
        &self,
        person_type_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError>;

    async fn find_all_by_area_id(
        &self,
        area_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError>;
}

#[async_trait]
pub trait EquipmentLookup: Send + Sync {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Equipment>, CoreError>;
}

#[async_trait]
pub trait WorkScheduleLookup: Send + Sync {
    async fn find_all(&self, tenant_id: DbId) -> Result<Vec<WorkSchedule>, CoreError>;

    async fn find_by_code(
        &self,
        code: i32,
        tenant_id: DbId,
    ) -> Result<Option<WorkSchedule>, CoreError>;
}

/// Fire-and-forget notification sink. Implementations must not block.
pub trait PushNotifier: Send + Sync {
    fn notify(&self, notification: PushNotification);
}

/// All collaborator lookups, wired once at startup.
#[derive(Clone)]
pub struct Directory {
    pub people: Arc<dyn PersonLookup>,
    pub access_points: Arc<dyn AccessPointLookup>,
    pub equipment: Arc<dyn EquipmentLookup>,
    pub work_schedules: Arc<dyn WorkScheduleLookup>,
    pub notifier: Arc<dyn PushNotifier>,
}

impl Directory {
    pub async fn person(&self, id: DbId, tenant_id: DbId) -> Result<Person, CoreError> {
        self.people
            .find_by_id(id, tenant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Person",
                id,
            })
    }

    pub async fn access_point(&self, id: DbId, tenant_id: DbId) -> Result<AccessPoint, CoreError> {
        self.access_points
            .find_by_id(id, tenant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "AccessPoint",
                id,
            })
    }

    pub async fn equipment(&self, id: DbId, tenant_id: DbId) -> Result<Equipment, CoreError> {
        self.equipment
            .find_by_id(id, tenant_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Equipment",
                id,
            })
    }

    /// Resolve schedule codes, skipping codes the tenant does not define.
    pub async fn work_schedules(
        &self,
        codes: &[i32],
        tenant_id: DbId,
    ) -> Result<Vec<WorkSchedule>, CoreError> {
        let mut schedules = Vec::with_capacity(codes.len());
        for code in codes {
            if let Some(schedule) = self.work_schedules.find_by_code(*code, tenant_id).await? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }
}
