//! Equipment synchronization coordinator.
//!
//! Grants are pushed by isolated background workers (see
//! [`sync_worker`](super::sync_worker)); the request that triggers a
//! dispatch returns as soon as the job record exists. Revocation is the
//! opposite: it runs inline because it backs interactive disable/delete and
//! its failures must reach the caller.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use accessgate_core::directory::{AccessPoint, Directory, Equipment, Person};
use accessgate_core::error::CoreError;
use accessgate_core::types::DbId;
use accessgate_db::models::access_release::AccessRelease;
use accessgate_db::models::sync_job::{NewSyncJob, SyncJob, SyncJobListQuery};
use accessgate_equipment::messages::{
    RemoveAccessRequest, WeekPlanTemplateRequest, WorkScheduleRequest,
};
use accessgate_equipment::EquipmentGateway;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::engine::store::{ReleaseStore, SyncJobStore};
use crate::engine::sync_worker::{bounded, SyncMessage, SyncWorker, WorkerReport};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct SyncCoordinator {
    jobs: Arc<dyn SyncJobStore>,
    releases: Arc<dyn ReleaseStore>,
    directory: Directory,
    gateway: Arc<dyn EquipmentGateway>,
    call_timeout: Duration,
    tracker: TaskTracker,
}

impl SyncCoordinator {
    pub fn new(
        jobs: Arc<dyn SyncJobStore>,
        releases: Arc<dyn ReleaseStore>,
        directory: Directory,
        gateway: Arc<dyn EquipmentGateway>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            releases,
            directory,
            gateway,
            call_timeout,
            tracker: TaskTracker::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Grant path (background)
    // -----------------------------------------------------------------------

    /// Persist a job for `releases` on `equipment` and hand it to a fresh
    /// worker task. Returns without waiting for any equipment call.
    pub async fn dispatch(
        &self,
        equipment: &Equipment,
        releases: Vec<AccessRelease>,
        audience: Vec<DbId>,
    ) -> AppResult<SyncJob> {
        let total_docs = i32::try_from(releases.len()).map_err(|_| {
            CoreError::Validation(format!("Too many releases in one job: {}", releases.len()))
        })?;

        let job = self
            .jobs
            .create(&NewSyncJob {
                tenant_id: equipment.tenant_id,
                equipment_id: equipment.id,
                person_type_ids: audience,
                total_docs,
            })
            .await?;

        let (tx, rx) = mpsc::channel(1);
        let worker = SyncWorker::new(
            Arc::clone(&self.jobs),
            self.directory.clone(),
            Arc::clone(&self.gateway),
            self.call_timeout,
        );
        let handle = self.tracker.spawn(worker.run(rx));

        tx.send(SyncMessage {
            releases,
            job_id: job.id,
            equipment: equipment.clone(),
            tenant_id: equipment.tenant_id,
        })
        .await
        .map_err(|_| AppError::InternalError("Sync worker exited before receiving its job".into()))?;

        let job_id = job.id;
        let equipment_id = equipment.id;
        self.tracker.spawn(async move {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => WorkerReport::Error {
                    error: format!("Sync worker crashed: {e}"),
                },
            };
            match report {
                WorkerReport::Completed => {
                    tracing::info!(job_id, equipment_id, "Sync worker completed");
                }
                WorkerReport::Error { error } => {
                    tracing::error!(job_id, equipment_id, error = %error, "Sync worker failed");
                }
            }
        });

        tracing::info!(
            job_id,
            equipment_id,
            total_docs,
            "Sync job dispatched"
        );
        Ok(job)
    }

    /// One job per equipment behind the access points `release` covers.
    pub async fn dispatch_release(&self, release: &AccessRelease) -> AppResult<Vec<SyncJob>> {
        let points = self.points_in_scope(release).await?;
        let equipment = self
            .resolve_equipment(equipment_ids(points.iter()), release.tenant_id)
            .await?;

        let mut jobs = Vec::with_capacity(equipment.len());
        for device in &equipment {
            let job = self
                .dispatch(device, vec![release.clone()], vec![release.person_type_id])
                .await?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Onboard a device: confirm it is reachable, register every work
    /// schedule template of the tenant, then push the active releases of
    /// the requested person types that are entitled to one of its points.
    pub async fn sync_equipment(
        &self,
        equipment_id: DbId,
        person_type_ids: &[DbId],
        tenant_id: DbId,
    ) -> AppResult<SyncJob> {
        let equipment = self.directory.equipment(equipment_id, tenant_id).await?;

        if let Err(e) = bounded(
            self.call_timeout,
            &equipment.ip,
            self.gateway.health_check(&equipment.ip),
        )
        .await
        {
            tracing::warn!(equipment_id, ip = %equipment.ip, error = %e, "Equipment unreachable");
            return Err(CoreError::NotFound {
                entity: "Equipment",
                id: equipment_id,
            }
            .into());
        }

        self.register_work_schedules(&equipment).await?;

        let mut audience = Vec::new();
        for person_type_id in person_type_ids {
            let points = self
                .directory
                .access_points
                .find_all_by_person_type_id(*person_type_id, tenant_id)
                .await?;
            if points.iter().any(|p| p.equipment_ids.contains(&equipment_id)) {
                audience.push(*person_type_id);
            }
        }

        let releases = if audience.is_empty() {
            Vec::new()
        } else {
            self.releases
                .list_active_by_person_types(tenant_id, &audience)
                .await?
        };

        self.dispatch(&equipment, releases, audience).await
    }

    /// Push a person type's active releases to every equipment behind the
    /// access points it is entitled to.
    pub async fn sync_person_type(
        &self,
        person_type_id: DbId,
        tenant_id: DbId,
    ) -> AppResult<Vec<SyncJob>> {
        let points = self
            .directory
            .access_points
            .find_all_by_person_type_id(person_type_id, tenant_id)
            .await?;
        let equipment = self
            .resolve_equipment(equipment_ids(points.iter()), tenant_id)
            .await?;
        let releases = self
            .releases
            .list_active_by_person_types(tenant_id, &[person_type_id])
            .await?;

        let mut jobs = Vec::with_capacity(equipment.len());
        for device in &equipment {
            let job = self
                .dispatch(device, releases.clone(), vec![person_type_id])
                .await?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Reachability check run before a device is accepted.
    pub async fn verify_equipment(&self, ip: &str) -> AppResult<()> {
        bounded(self.call_timeout, ip, self.gateway.health_check(ip))
            .await
            .map_err(|e| {
                tracing::warn!(ip, error = %e, "Equipment verification failed");
                AppError::Core(CoreError::Equipment(format!(
                    "Equipment at {ip} is not reachable: {e}"
                )))
            })
    }

    // -----------------------------------------------------------------------
    // Revoke path (synchronous)
    // -----------------------------------------------------------------------

    /// Remove `person` from every device guarding an access point their
    /// person type is entitled to, except general exits.
    ///
    /// Every device is attempted; if any fails, one error naming each
    /// failing device is returned.
    pub async fn remove_from_all_equipment(&self, person: &Person) -> AppResult<()> {
        let points = self
            .directory
            .access_points
            .find_all_by_person_type_id(person.person_type_id, person.tenant_id)
            .await?;
        let equipment = self
            .resolve_equipment(
                equipment_ids(points.iter().filter(|p| !p.general_exit)),
                person.tenant_id,
            )
            .await?;

        let results = join_all(equipment.iter().map(|device| async move {
            let request = RemoveAccessRequest {
                person_id: person.id,
                ip: device.ip.clone(),
            };
            bounded(
                self.call_timeout,
                &device.ip,
                self.gateway.remove_access(&request),
            )
            .await
            .map_err(|e| format!("equipment {} ({}): {e}", device.id, device.ip))
        }))
        .await;

        let failures: Vec<String> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            tracing::info!(
                person_id = person.id,
                devices = equipment.len(),
                "Access revoked from equipment"
            );
            return Ok(());
        }

        tracing::warn!(
            person_id = person.id,
            failed = failures.len(),
            devices = equipment.len(),
            "Access revocation partially failed"
        );
        Err(CoreError::Equipment(format!(
            "Failed to revoke access for person {} on {} of {} equipment: {}",
            person.id,
            failures.len(),
            equipment.len(),
            failures.join("; ")
        ))
        .into())
    }

    /// Fire-and-forget revocation for a person seen at a gate without an
    /// active release.
    pub fn revoke_in_background(&self, person: Person) {
        let coordinator = self.clone();
        self.tracker.spawn(async move {
            if let Err(e) = coordinator.remove_from_all_equipment(&person).await {
                tracing::error!(person_id = person.id, error = %e, "Background revocation failed");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_job(&self, id: DbId, tenant_id: DbId) -> AppResult<SyncJob> {
        self.jobs
            .find_by_id(id, tenant_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "SyncJob",
                    id,
                }
                .into()
            })
    }

    pub async fn list_jobs(
        &self,
        tenant_id: DbId,
        params: &SyncJobListQuery,
    ) -> AppResult<Vec<SyncJob>> {
        Ok(self.jobs.list(tenant_id, params).await?)
    }

    /// Workers and background revocations still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every in-flight worker and background revocation.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    // ---- private helpers ----

    async fn points_in_scope(&self, release: &AccessRelease) -> AppResult<Vec<AccessPoint>> {
        if let Some(point_id) = release.access_point_id {
            let point = self
                .directory
                .access_point(point_id, release.tenant_id)
                .await?;
            return Ok(vec![point]);
        }

        let mut points = Vec::new();
        for area_id in &release.area_ids {
            points.extend(
                self.directory
                    .access_points
                    .find_all_by_area_id(*area_id, release.tenant_id)
                    .await?,
            );
        }
        Ok(points)
    }

    async fn resolve_equipment(
        &self,
        ids: BTreeSet<DbId>,
        tenant_id: DbId,
    ) -> AppResult<Vec<Equipment>> {
        let mut equipment = Vec::with_capacity(ids.len());
        for id in ids {
            match self.directory.equipment.find_by_id(id, tenant_id).await? {
                Some(device) => equipment.push(device),
                None => tracing::warn!(equipment_id = id, tenant_id, "Linked equipment not found"),
            }
        }
        Ok(equipment)
    }

    async fn register_work_schedules(&self, equipment: &Equipment) -> AppResult<()> {
        let schedules = self
            .directory
            .work_schedules
            .find_all(equipment.tenant_id)
            .await?;

        for schedule in &schedules {
            let template = WeekPlanTemplateRequest {
                id: schedule.code,
                name: schedule.name.clone(),
                ip: equipment.ip.clone(),
            };
            bounded(
                self.call_timeout,
                &equipment.ip,
                self.gateway.add_week_plan_template(&template),
            )
            .await
            .map_err(|e| CoreError::Equipment(e.to_string()))?;

            let request = WorkScheduleRequest::for_device(schedule, &equipment.ip);
            bounded(
                self.call_timeout,
                &equipment.ip,
                self.gateway.add_work_schedule(&request),
            )
            .await
            .map_err(|e| CoreError::Equipment(e.to_string()))?;
        }

        tracing::info!(
            equipment_id = equipment.id,
            schedules = schedules.len(),
            "Work schedules registered on equipment"
        );
        Ok(())
    }
}

/// Distinct equipment ids behind `points`, in ascending order.
fn equipment_ids<'a>(points: impl Iterator<Item = &'a AccessPoint>) -> BTreeSet<DbId> {
    points
        .flat_map(|p| p.equipment_ids.iter().copied())
        .collect()
}
