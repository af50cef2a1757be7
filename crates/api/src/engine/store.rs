//! Persistence seams for the lifecycle engine.
//!
//! The engine talks to these traits instead of the repositories directly so
//! the state machine and the sync worker can be exercised against in-memory
//! stores. [`PgStore`] is the production implementation and simply delegates
//! to the `accessgate_db` repositories.

use accessgate_core::release::ReleaseAction;
use accessgate_core::sync::SyncError;
use accessgate_core::types::{DbId, Timestamp};
use accessgate_db::models::access_control::{
    AccessControl, AccessControlListQuery, NewAccessControl,
};
use accessgate_db::models::access_release::{AccessRelease, NewAccessRelease, ReleaseListQuery};
use accessgate_db::models::status::ReleaseStatus;
use accessgate_db::models::sync_job::{NewSyncJob, SyncJob, SyncJobListQuery};
use accessgate_db::repositories::access_release_repo::ONE_ACTIVE_CONSTRAINT;
use accessgate_db::repositories::{
    AccessControlRepo, AccessReleaseRepo, CreateOutcome, SyncJobRepo,
};
use accessgate_db::DbPool;
use async_trait::async_trait;

/// Result of a conditional status change.
#[derive(Debug)]
pub enum Transition {
    Applied(AccessRelease),
    /// The release was no longer in the expected status; nothing changed.
    Stale,
    /// Activation lost the race against another active release.
    ActiveExists,
}

#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn create_scheduled(&self, input: &NewAccessRelease)
        -> Result<CreateOutcome, sqlx::Error>;

    async fn find_by_id(
        &self,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error>;

    async fn find_by_id_unscoped(&self, id: DbId) -> Result<Option<AccessRelease>, sqlx::Error>;

    async fn find_active_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error>;

    async fn list_open_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessRelease>, sqlx::Error>;

    async fn list(
        &self,
        tenant_id: DbId,
        params: &ReleaseListQuery,
    ) -> Result<Vec<AccessRelease>, sqlx::Error>;

    async fn transition(
        &self,
        id: DbId,
        from: ReleaseStatus,
        to: ReleaseStatus,
        action: &ReleaseAction,
    ) -> Result<Transition, sqlx::Error>;

    async fn list_due_activations(&self, before: Timestamp)
        -> Result<Vec<AccessRelease>, sqlx::Error>;

    async fn list_due_expirations(&self, before: Timestamp)
        -> Result<Vec<AccessRelease>, sqlx::Error>;

    async fn list_active_by_person_types(
        &self,
        tenant_id: DbId,
        person_type_ids: &[DbId],
    ) -> Result<Vec<AccessRelease>, sqlx::Error>;
}

/// Job bookkeeping. Every mutation touches a single field.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    async fn create(&self, input: &NewSyncJob) -> Result<SyncJob, sqlx::Error>;

    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<SyncJob>, sqlx::Error>;

    async fn list(
        &self,
        tenant_id: DbId,
        params: &SyncJobListQuery,
    ) -> Result<Vec<SyncJob>, sqlx::Error>;

    async fn increment_executed(&self, id: DbId, count: i32) -> Result<(), sqlx::Error>;

    async fn push_error(&self, id: DbId, error: &SyncError) -> Result<(), sqlx::Error>;

    async fn finish(&self, id: DbId) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait AccessControlStore: Send + Sync {
    async fn create(&self, input: &NewAccessControl) -> Result<AccessControl, sqlx::Error>;

    async fn list(
        &self,
        tenant_id: DbId,
        params: &AccessControlListQuery,
    ) -> Result<Vec<AccessControl>, sqlx::Error>;
}

/// Postgres-backed implementation of every store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseStore for PgStore {
    async fn create_scheduled(
        &self,
        input: &NewAccessRelease,
    ) -> Result<CreateOutcome, sqlx::Error> {
        AccessReleaseRepo::create_scheduled(&self.pool, input).await
    }

    async fn find_by_id(
        &self,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::find_by_id(&self.pool, id, tenant_id).await
    }

    async fn find_by_id_unscoped(&self, id: DbId) -> Result<Option<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::find_by_id_unscoped(&self.pool, id).await
    }

    async fn find_active_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::find_active_for_person(&self.pool, person_id, tenant_id).await
    }

    async fn list_open_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::list_open_for_person(&self.pool, person_id, tenant_id).await
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &ReleaseListQuery,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::list(&self.pool, tenant_id, params).await
    }

    async fn transition(
        &self,
        id: DbId,
        from: ReleaseStatus,
        to: ReleaseStatus,
        action: &ReleaseAction,
    ) -> Result<Transition, sqlx::Error> {
        match AccessReleaseRepo::transition(&self.pool, id, from.id(), to.id(), action).await {
            Ok(Some(release)) => Ok(Transition::Applied(release)),
            Ok(None) => Ok(Transition::Stale),
            Err(e) if accessgate_db::is_unique_violation(&e, ONE_ACTIVE_CONSTRAINT) => {
                Ok(Transition::ActiveExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_due_activations(
        &self,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::list_due_activations(&self.pool, before).await
    }

    async fn list_due_expirations(
        &self,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::list_due_expirations(&self.pool, before).await
    }

    async fn list_active_by_person_types(
        &self,
        tenant_id: DbId,
        person_type_ids: &[DbId],
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        AccessReleaseRepo::list_active_by_person_types(&self.pool, tenant_id, person_type_ids)
            .await
    }
}

#[async_trait]
impl SyncJobStore for PgStore {
    async fn create(&self, input: &NewSyncJob) -> Result<SyncJob, sqlx::Error> {
        SyncJobRepo::create(&self.pool, input).await
    }

    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<SyncJob>, sqlx::Error> {
        SyncJobRepo::find_by_id(&self.pool, id, tenant_id).await
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &SyncJobListQuery,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        SyncJobRepo::list(&self.pool, tenant_id, params).await
    }

    async fn increment_executed(&self, id: DbId, count: i32) -> Result<(), sqlx::Error> {
        SyncJobRepo::increment_executed(&self.pool, id, count).await
    }

    async fn push_error(&self, id: DbId, error: &SyncError) -> Result<(), sqlx::Error> {
        SyncJobRepo::push_error(&self.pool, id, error).await
    }

    async fn finish(&self, id: DbId) -> Result<(), sqlx::Error> {
        SyncJobRepo::finish(&self.pool, id).await
    }
}

#[async_trait]
impl AccessControlStore for PgStore {
    async fn create(&self, input: &NewAccessControl) -> Result<AccessControl, sqlx::Error> {
        AccessControlRepo::create(&self.pool, input).await
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &AccessControlListQuery,
    ) -> Result<Vec<AccessControl>, sqlx::Error> {
        AccessControlRepo::list(&self.pool, tenant_id, params).await
    }
}
