//! Entry/exit recording.
//!
//! A record is only written for a person holding an active release that
//! covers the access point. People seen without one are revoked from
//! equipment in the background, since a device that still lets them in is
//! out of sync.
//!
//! A single-access release admits one entry and ends when its holder's
//! exit is recorded.

use std::sync::Arc;

use accessgate_core::access_control::{
    point_in_scope, validate_direction, AccessPointSnapshot, PersonSnapshot, DIRECTION_ENTRY,
    DIRECTION_EXIT,
};
use accessgate_core::directory::{Directory, PushNotification, PUSH_ACCESS_ENTRY};
use accessgate_core::error::CoreError;
use accessgate_core::release::{ReleaseAction, ACTION_CREATE};
use accessgate_core::types::DbId;
use accessgate_db::models::access_control::{
    AccessControl, AccessControlListQuery, NewAccessControl,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::engine::release::ReleaseService;
use crate::engine::store::{AccessControlStore, ReleaseStore};
use crate::engine::sync::SyncCoordinator;
use crate::error::AppResult;

/// Body of `POST /api/v1/access-controls`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordAccess {
    pub person_id: DbId,
    pub access_point_id: DbId,
    pub direction: String,
    #[validate(length(max = 1000))]
    pub observation: Option<String>,
    /// Defaults to the release's responsible person.
    pub responsible_id: Option<DbId>,
}

#[derive(Clone)]
pub struct AccessControlRecorder {
    controls: Arc<dyn AccessControlStore>,
    releases: Arc<dyn ReleaseStore>,
    directory: Directory,
    sync: SyncCoordinator,
    lifecycle: ReleaseService,
}

impl AccessControlRecorder {
    pub fn new(
        controls: Arc<dyn AccessControlStore>,
        releases: Arc<dyn ReleaseStore>,
        directory: Directory,
        sync: SyncCoordinator,
        lifecycle: ReleaseService,
    ) -> Self {
        Self {
            controls,
            releases,
            directory,
            sync,
            lifecycle,
        }
    }

    pub async fn record(
        &self,
        tenant_id: DbId,
        actor: Option<DbId>,
        input: RecordAccess,
    ) -> AppResult<AccessControl> {
        input.validate().map_err(CoreError::from)?;
        validate_direction(&input.direction)?;

        let person = self.directory.person(input.person_id, tenant_id).await?;
        let point = self
            .directory
            .access_point(input.access_point_id, tenant_id)
            .await?;

        let Some(release) = self
            .releases
            .find_active_for_person(person.id, tenant_id)
            .await?
        else {
            tracing::warn!(
                person_id = person.id,
                access_point_id = point.id,
                "Access attempt without an active release, revoking from equipment"
            );
            let person_id = person.id;
            self.sync.revoke_in_background(person);
            return Err(CoreError::NotFound {
                entity: "ActiveAccessRelease",
                id: person_id,
            }
            .into());
        };

        if !point_in_scope(&point, &release.area_ids, release.access_point_id) {
            return Err(CoreError::Conflict(format!(
                "Access point {} is not covered by access release {}",
                point.id, release.id
            ))
            .into());
        }

        if release.single_access
            && input.direction == DIRECTION_ENTRY
            && self.has_entry(tenant_id, release.id).await?
        {
            return Err(CoreError::Conflict(format!(
                "Single-access release {} has already been used for an entry",
                release.id
            ))
            .into());
        }

        let responsible = match input.responsible_id.or(release.responsible_id) {
            Some(id) => self
                .directory
                .people
                .find_by_id(id, tenant_id)
                .await?
                .map(|p| PersonSnapshot::from(&p)),
            None => None,
        };

        let record = self
            .controls
            .create(&NewAccessControl {
                tenant_id,
                release_id: release.id,
                person: PersonSnapshot::from(&person),
                access_point: AccessPointSnapshot::from(&point),
                responsible,
                direction: input.direction,
                observation: input.observation,
                created: ReleaseAction::new(ACTION_CREATE, Utc::now(), actor),
            })
            .await?;

        tracing::info!(
            access_control_id = record.id,
            release_id = release.id,
            person_id = person.id,
            access_point_id = point.id,
            direction = %record.direction,
            "Access recorded"
        );

        if record.direction == DIRECTION_ENTRY {
            if let Some(recipient_id) = release.responsible_id {
                self.directory.notifier.notify(PushNotification {
                    kind: PUSH_ACCESS_ENTRY.to_string(),
                    tenant_id,
                    recipient_id,
                    title: "Visitor arrived".to_string(),
                    body: format!("{} entered through {}", person.name, point.name),
                    payload: serde_json::json!({
                        "access_control_id": record.id,
                        "release_id": release.id,
                        "person_id": person.id,
                        "access_point_id": point.id,
                    }),
                });
            }
        }

        if release.single_access && record.direction == DIRECTION_EXIT {
            let release_id = release.id;
            if let Err(e) = self
                .lifecycle
                .complete_single_access(release, person, actor)
                .await
            {
                tracing::error!(release_id, error = %e, "Failed to end single-access release");
            }
        }

        Ok(record)
    }

    async fn has_entry(&self, tenant_id: DbId, release_id: DbId) -> AppResult<bool> {
        let params = AccessControlListQuery {
            release_id: Some(release_id),
            limit: None,
            offset: None,
        };
        let records = self.controls.list(tenant_id, &params).await?;
        Ok(records.iter().any(|r| r.direction == DIRECTION_ENTRY))
    }

    pub async fn list(
        &self,
        tenant_id: DbId,
        params: &AccessControlListQuery,
    ) -> AppResult<Vec<AccessControl>> {
        Ok(self.controls.list(tenant_id, params).await?)
    }
}
