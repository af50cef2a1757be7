//! Access-release lifecycle orchestration.
//!
//! Wires the pure rules in [`accessgate_core::release`] to storage, the
//! conflict checks, equipment sync, and the one-off transition timers.
//! Every status change goes through [`ReleaseStore::transition`], which only
//! applies when the release is still in the expected status, so timers, the
//! daily sweep, and API calls can race freely.

use std::sync::Arc;

use accessgate_core::directory::{Directory, Person, PushNotification, PUSH_INVITE_FULFILLED};
use accessgate_core::error::CoreError;
use accessgate_core::release::{
    invitation_init_date, state_machine, validate_release_type, ReleaseAction, ReleasePolicy,
    ACTION_ACTIVATE, ACTION_CONFLICT, ACTION_CREATE, ACTION_DELETE, ACTION_EXPIRE,
    ACTION_UPDATE, RELEASE_TYPE_INVITE,
};
use accessgate_core::scheduling::ScheduleClock;
use accessgate_core::types::{DbId, Timestamp};
use accessgate_db::models::access_release::{AccessRelease, NewAccessRelease, ReleaseListQuery};
use accessgate_db::models::status::ReleaseStatus;
use accessgate_db::repositories::CreateOutcome;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::background::timers::{ScheduledTransition, TransitionTimers};
use crate::engine::conflict::ConflictValidator;
use crate::engine::store::{ReleaseStore, Transition};
use crate::engine::sync::SyncCoordinator;
use crate::error::{AppError, AppResult};

/// Body of `POST /api/v1/access-releases`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccessRelease {
    pub person_id: DbId,
    pub responsible_id: Option<DbId>,
    #[validate(length(min = 1, message = "at least one area is required"))]
    pub area_ids: Vec<DbId>,
    pub access_point_id: Option<DbId>,
    pub release_type: String,
    pub init_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    /// Validity from `init_date` when no `end_date` is given.
    #[validate(range(min = 1, max = 525_600))]
    pub expiring_minutes: Option<i64>,
    #[serde(default)]
    pub single_access: bool,
    #[serde(default)]
    pub work_schedule_codes: Vec<i32>,
}

/// Body of `POST /api/v1/access-releases/invitations`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AcceptInvitation {
    pub invitation_id: DbId,
    pub person_id: DbId,
    /// Host who issued the invitation; notified once the guest is cleared.
    pub responsible_id: DbId,
    #[validate(length(min = 1, message = "at least one area is required"))]
    pub area_ids: Vec<DbId>,
    pub access_point_id: Option<DbId>,
    pub init_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    #[validate(range(min = 1, max = 525_600))]
    pub expiring_minutes: Option<i64>,
    #[serde(default)]
    pub single_access: bool,
    #[serde(default)]
    pub work_schedule_codes: Vec<i32>,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub activated: usize,
    pub expired: usize,
    pub conflicted: usize,
    pub timers_registered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReleaseService {
    releases: Arc<dyn ReleaseStore>,
    directory: Directory,
    conflicts: ConflictValidator,
    sync: SyncCoordinator,
    timers: Arc<TransitionTimers>,
    policy: ReleasePolicy,
}

impl ReleaseService {
    pub fn new(
        releases: Arc<dyn ReleaseStore>,
        directory: Directory,
        sync: SyncCoordinator,
        timers: Arc<TransitionTimers>,
        policy: ReleasePolicy,
    ) -> Self {
        Self {
            conflicts: ConflictValidator::new(Arc::clone(&releases)),
            releases,
            directory,
            sync,
            timers,
            policy,
        }
    }

    fn clock(&self) -> &ScheduleClock {
        self.timers.clock()
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Validate, persist as `scheduled`, then activate right away when the
    /// window has already started or arm timers for what is due today.
    pub async fn create(
        &self,
        tenant_id: DbId,
        actor: Option<DbId>,
        input: CreateAccessRelease,
    ) -> AppResult<AccessRelease> {
        input.validate().map_err(CoreError::from)?;
        validate_release_type(&input.release_type)?;
        let (release, _) = self.create_release(tenant_id, actor, input, None).await?;
        Ok(release)
    }

    /// Turn an accepted invitation into an `invite` release. A late
    /// acceptance starts now rather than in the past.
    pub async fn create_from_invitation(
        &self,
        tenant_id: DbId,
        actor: Option<DbId>,
        input: AcceptInvitation,
    ) -> AppResult<AccessRelease> {
        input.validate().map_err(CoreError::from)?;

        let init_date = invitation_init_date(Utc::now(), input.init_date);
        let request = CreateAccessRelease {
            person_id: input.person_id,
            responsible_id: Some(input.responsible_id),
            area_ids: input.area_ids,
            access_point_id: input.access_point_id,
            release_type: RELEASE_TYPE_INVITE.to_string(),
            init_date: Some(init_date),
            end_date: input.end_date,
            expiring_minutes: input.expiring_minutes,
            single_access: input.single_access,
            work_schedule_codes: input.work_schedule_codes,
        };

        let (release, person) = self
            .create_release(tenant_id, actor, request, Some(input.invitation_id))
            .await?;

        self.directory.notifier.notify(PushNotification {
            kind: PUSH_INVITE_FULFILLED.to_string(),
            tenant_id,
            recipient_id: input.responsible_id,
            title: "Invitation accepted".to_string(),
            body: format!("{} is cleared for access", person.name),
            payload: serde_json::json!({
                "release_id": release.id,
                "invitation_id": input.invitation_id,
                "person_id": person.id,
                "init_date": release.init_date,
                "end_date": release.end_date,
            }),
        });

        Ok(release)
    }

    async fn create_release(
        &self,
        tenant_id: DbId,
        actor: Option<DbId>,
        input: CreateAccessRelease,
        invitation_id: Option<DbId>,
    ) -> AppResult<(AccessRelease, Person)> {
        let person = self.directory.person(input.person_id, tenant_id).await?;

        if let Some(point_id) = input.access_point_id {
            let point = self.directory.access_point(point_id, tenant_id).await?;
            if !input.area_ids.contains(&point.area_id) {
                return Err(CoreError::Validation(format!(
                    "Access point {point_id} is not inside the release areas"
                ))
                .into());
            }
        }

        self.conflicts
            .ensure_no_active_release(person.id, tenant_id)
            .await?;

        let now = Utc::now();
        let (init_date, end_date) = self.policy.resolve_window(
            now,
            input.init_date,
            input.end_date,
            input.expiring_minutes,
        )?;

        self.conflicts
            .overlapping_releases(person.id, tenant_id, (init_date, end_date))
            .await?;

        let new = NewAccessRelease {
            tenant_id,
            person_id: person.id,
            person_type_id: person.person_type_id,
            responsible_id: input.responsible_id,
            area_ids: input.area_ids,
            access_point_id: input.access_point_id,
            release_type: input.release_type,
            init_date,
            end_date,
            single_access: input.single_access,
            work_schedule_codes: self.policy.work_schedule_codes(&input.work_schedule_codes),
            invitation_id,
            created: ReleaseAction::new(ACTION_CREATE, now, actor),
        };

        let release = match self.releases.create_scheduled(&new).await? {
            CreateOutcome::Created(release) => release,
            CreateOutcome::ActiveExists(active_id) => {
                return Err(CoreError::Conflict(format!(
                    "Person {} already has an active access release ({active_id})",
                    person.id
                ))
                .into())
            }
        };

        tracing::info!(
            release_id = release.id,
            person_id = person.id,
            tenant_id,
            init_date = %release.init_date,
            end_date = %release.end_date,
            "Access release created"
        );

        let release = if release.init_date <= now {
            self.activate(release, actor).await?
        } else {
            if self.clock().due_today(release.init_date, now) {
                self.timers
                    .schedule(release.id, ScheduledTransition::Activate, release.init_date);
            }
            if self.clock().due_today(release.end_date, now) {
                self.timers
                    .schedule(release.id, ScheduledTransition::Expire, release.end_date);
            }
            release
        };

        Ok((release, person))
    }

    // -----------------------------------------------------------------------
    // Operator transitions
    // -----------------------------------------------------------------------

    /// Revoke a release. Active releases are removed from equipment before
    /// the status changes; a failed removal leaves the release untouched.
    pub async fn disable(
        &self,
        id: DbId,
        tenant_id: DbId,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let release = self.get(id, tenant_id).await?;

        let from = match status_of(&release)? {
            ReleaseStatus::Disabled => {
                tracing::debug!(release_id = id, "Release already disabled");
                return Ok(release);
            }
            ReleaseStatus::Deleted => {
                return Err(CoreError::Conflict(format!(
                    "Access release {id} has been deleted"
                ))
                .into())
            }
            ended @ (ReleaseStatus::Expired | ReleaseStatus::Conflict) => {
                return Err(CoreError::Conflict(format!(
                    "Access release {id} already ended as {}",
                    state_machine::status_name(ended.id())
                ))
                .into())
            }
            ReleaseStatus::Active => {
                self.revoke(&release).await?;
                ReleaseStatus::Active
            }
            ReleaseStatus::Scheduled => ReleaseStatus::Scheduled,
        };

        let action = ReleaseAction::new(ACTION_UPDATE, Utc::now(), actor);
        let disabled = self
            .apply_operator_transition(&release, from, ReleaseStatus::Disabled, &action)
            .await?;

        tracing::info!(release_id = id, tenant_id, "Access release disabled");
        Ok(disabled)
    }

    /// Soft delete. Deleting twice is a no-op.
    pub async fn delete(
        &self,
        id: DbId,
        tenant_id: DbId,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let release = self.get(id, tenant_id).await?;

        let from = status_of(&release)?;
        match from {
            ReleaseStatus::Deleted => return Ok(release),
            ReleaseStatus::Active => self.revoke(&release).await?,
            _ => {}
        }

        let action = ReleaseAction::new(ACTION_DELETE, Utc::now(), actor);
        let deleted = self
            .apply_operator_transition(&release, from, ReleaseStatus::Deleted, &action)
            .await?;

        tracing::info!(release_id = id, tenant_id, "Access release deleted");
        Ok(deleted)
    }

    async fn apply_operator_transition(
        &self,
        release: &AccessRelease,
        from: ReleaseStatus,
        to: ReleaseStatus,
        action: &ReleaseAction,
    ) -> AppResult<AccessRelease> {
        state_machine::validate_transition(from.id(), to.id()).map_err(CoreError::Conflict)?;

        match self.releases.transition(release.id, from, to, action).await? {
            Transition::Applied(updated) => {
                self.timers.cancel_release(release.id);
                Ok(updated)
            }
            Transition::Stale | Transition::ActiveExists => Err(CoreError::Conflict(format!(
                "Access release {} changed status concurrently, retry the request",
                release.id
            ))
            .into()),
        }
    }

    async fn revoke(&self, release: &AccessRelease) -> AppResult<()> {
        match self
            .directory
            .people
            .find_by_id(release.person_id, release.tenant_id)
            .await?
        {
            Some(person) => self.sync.remove_from_all_equipment(&person).await,
            None => {
                tracing::warn!(
                    release_id = release.id,
                    person_id = release.person_id,
                    "Person no longer exists, skipping equipment revocation"
                );
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scheduled transitions
    // -----------------------------------------------------------------------

    /// Timer/sweep entry point for a release whose `init_date` was reached.
    pub async fn activate_on_schedule(&self, id: DbId) -> AppResult<AccessRelease> {
        let release = self.get_unscoped(id).await?;

        if !release.is_scheduled() {
            tracing::debug!(release_id = id, status_id = release.status_id, "Activation skipped");
            return Ok(release);
        }
        if release.init_date > Utc::now() {
            self.timers
                .schedule(id, ScheduledTransition::Activate, release.init_date);
            return Ok(release);
        }

        self.activate(release, None).await
    }

    /// Timer/sweep entry point for a release whose `end_date` was reached.
    /// Equipment is not touched: revocation happens on the next access
    /// attempt or an explicit disable.
    pub async fn expire_on_schedule(&self, id: DbId) -> AppResult<AccessRelease> {
        let release = self.get_unscoped(id).await?;

        if state_machine::is_ended(release.status_id) || release.end_date > Utc::now() {
            tracing::debug!(release_id = id, status_id = release.status_id, "Expiry skipped");
            return Ok(release);
        }

        self.expire(release, None).await
    }

    /// End a single-access release once its holder has left. The holder
    /// is revoked from equipment in the background; general exits keep
    /// working.
    pub async fn complete_single_access(
        &self,
        release: AccessRelease,
        person: Person,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let id = release.id;
        let ended = self.expire(release, actor).await?;
        if ended.status_id == state_machine::EXPIRED {
            tracing::info!(release_id = id, person_id = person.id, "Single-access release used up");
            self.sync.revoke_in_background(person);
        }
        Ok(ended)
    }

    /// Bring every overdue release up to date and arm timers for whatever
    /// falls due before the next local midnight.
    pub async fn reconcile(&self, now: Timestamp) -> AppResult<ReconcileSummary> {
        let horizon = self.clock().next_local_midnight(now);
        let mut summary = ReconcileSummary::default();

        for release in self.releases.list_due_activations(horizon).await? {
            if release.init_date > now {
                self.timers
                    .schedule(release.id, ScheduledTransition::Activate, release.init_date);
                summary.timers_registered += 1;
                continue;
            }
            match self.activate_on_schedule(release.id).await {
                Ok(updated) => match ReleaseStatus::from_id(updated.status_id) {
                    Some(ReleaseStatus::Active) => summary.activated += 1,
                    Some(ReleaseStatus::Conflict) => summary.conflicted += 1,
                    Some(ReleaseStatus::Expired) => summary.expired += 1,
                    _ => {}
                },
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(release_id = release.id, error = %e, "Sweep activation failed");
                }
            }
        }

        for release in self.releases.list_due_expirations(horizon).await? {
            if release.end_date > now {
                self.timers
                    .schedule(release.id, ScheduledTransition::Expire, release.end_date);
                summary.timers_registered += 1;
                continue;
            }
            match self.expire_on_schedule(release.id).await {
                Ok(updated) if updated.status_id == state_machine::EXPIRED => summary.expired += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(release_id = release.id, error = %e, "Sweep expiry failed");
                }
            }
        }

        tracing::info!(
            activated = summary.activated,
            expired = summary.expired,
            conflicted = summary.conflicted,
            timers_registered = summary.timers_registered,
            failed = summary.failed,
            "Release reconciliation finished"
        );
        Ok(summary)
    }

    async fn activate(
        &self,
        release: AccessRelease,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let now = Utc::now();
        if release.end_date <= now {
            return self.expire(release, actor).await;
        }

        if let Some(other) = self.conflicts.find_other_active(&release).await? {
            return self.mark_conflict(release, Some(other.id), actor).await;
        }

        let action = ReleaseAction::new(ACTION_ACTIVATE, now, actor);
        match self
            .releases
            .transition(release.id, ReleaseStatus::Scheduled, ReleaseStatus::Active, &action)
            .await?
        {
            Transition::Applied(active) => {
                tracing::info!(
                    release_id = active.id,
                    person_id = active.person_id,
                    "Access release activated"
                );
                if let Err(e) = self.sync.dispatch_release(&active).await {
                    tracing::error!(
                        release_id = active.id,
                        error = %e,
                        "Failed to dispatch equipment sync for activated release"
                    );
                }
                if self.clock().due_today(active.end_date, now) {
                    self.timers
                        .schedule(active.id, ScheduledTransition::Expire, active.end_date);
                }
                Ok(active)
            }
            Transition::ActiveExists => self.mark_conflict(release, None, actor).await,
            Transition::Stale => self.get_unscoped(release.id).await,
        }
    }

    async fn mark_conflict(
        &self,
        release: AccessRelease,
        other: Option<DbId>,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let action = ReleaseAction::new(ACTION_CONFLICT, Utc::now(), actor);
        match self
            .releases
            .transition(release.id, ReleaseStatus::Scheduled, ReleaseStatus::Conflict, &action)
            .await?
        {
            Transition::Applied(conflicted) => {
                tracing::warn!(
                    release_id = conflicted.id,
                    person_id = conflicted.person_id,
                    active_release_id = ?other,
                    "Access release due while another release is active, marked as conflict"
                );
                self.timers.cancel_release(conflicted.id);
                Ok(conflicted)
            }
            Transition::Stale | Transition::ActiveExists => self.get_unscoped(release.id).await,
        }
    }

    async fn expire(
        &self,
        release: AccessRelease,
        actor: Option<DbId>,
    ) -> AppResult<AccessRelease> {
        let from = status_of(&release)?;
        let action = ReleaseAction::new(ACTION_EXPIRE, Utc::now(), actor);
        match self
            .releases
            .transition(release.id, from, ReleaseStatus::Expired, &action)
            .await?
        {
            Transition::Applied(expired) => {
                tracing::info!(release_id = expired.id, "Access release expired");
                self.timers.cancel_release(expired.id);
                Ok(expired)
            }
            Transition::Stale | Transition::ActiveExists => self.get_unscoped(release.id).await,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get(&self, id: DbId, tenant_id: DbId) -> AppResult<AccessRelease> {
        self.releases
            .find_by_id(id, tenant_id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(
        &self,
        tenant_id: DbId,
        params: &ReleaseListQuery,
    ) -> AppResult<Vec<AccessRelease>> {
        Ok(self.releases.list(tenant_id, params).await?)
    }

    async fn get_unscoped(&self, id: DbId) -> AppResult<AccessRelease> {
        self.releases
            .find_by_id_unscoped(id)
            .await?
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "AccessRelease",
        id,
    })
}

fn status_of(release: &AccessRelease) -> AppResult<ReleaseStatus> {
    ReleaseStatus::from_id(release.status_id).ok_or_else(|| {
        AppError::InternalError(format!(
            "Access release {} has unknown status {}",
            release.id, release.status_id
        ))
    })
}
