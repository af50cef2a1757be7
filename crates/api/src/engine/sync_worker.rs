//! Isolated equipment fan-out worker.
//!
//! The coordinator spawns one worker task per job and hands it a single
//! [`SyncMessage`] over an mpsc channel. The worker persists its own
//! progress through [`SyncJobStore`] and only reports the final outcome
//! back as a [`WorkerReport`].

use std::sync::Arc;
use std::time::Duration;

use accessgate_core::directory::{Directory, Equipment};
use accessgate_core::sync::{SyncError, SYNC_BATCH_SIZE};
use accessgate_core::types::DbId;
use accessgate_db::models::access_release::AccessRelease;
use accessgate_equipment::messages::AddAccessRequest;
use accessgate_equipment::{EquipmentError, EquipmentGateway};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::engine::store::SyncJobStore;

/// Parent to worker: everything one job needs.
#[derive(Debug, Clone)]
pub struct SyncMessage {
    pub releases: Vec<AccessRelease>,
    pub job_id: DbId,
    pub equipment: Equipment,
    pub tenant_id: DbId,
}

/// Worker to parent: final outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerReport {
    Completed,
    Error { error: String },
}

#[derive(Clone)]
pub struct SyncWorker {
    jobs: Arc<dyn SyncJobStore>,
    directory: Directory,
    gateway: Arc<dyn EquipmentGateway>,
    call_timeout: Duration,
}

impl SyncWorker {
    pub fn new(
        jobs: Arc<dyn SyncJobStore>,
        directory: Directory,
        gateway: Arc<dyn EquipmentGateway>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            directory,
            gateway,
            call_timeout,
        }
    }

    /// Wait for the job message, process it, and report.
    pub async fn run(self, mut inbox: mpsc::Receiver<SyncMessage>) -> WorkerReport {
        let Some(message) = inbox.recv().await else {
            return WorkerReport::Error {
                error: "Sync worker channel closed before a job was received".into(),
            };
        };
        let job_id = message.job_id;
        match self.process(message).await {
            Ok(()) => WorkerReport::Completed,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Sync job aborted");
                WorkerReport::Error {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Push every release in FIFO batches. Device failures are recorded on
    /// the job; only storage failures abort it.
    async fn process(&self, message: SyncMessage) -> Result<(), sqlx::Error> {
        let SyncMessage {
            releases,
            job_id,
            equipment,
            tenant_id,
        } = message;

        tracing::info!(
            job_id,
            equipment_id = equipment.id,
            total = releases.len(),
            "Sync job started"
        );

        for (index, batch) in releases.chunks(SYNC_BATCH_SIZE).enumerate() {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|release| self.push_release(release, &equipment, tenant_id)),
            )
            .await;

            let mut failed = 0usize;
            for message in outcomes.into_iter().filter_map(Result::err) {
                failed += 1;
                let error = SyncError {
                    equipment_id: equipment.id,
                    equipment_ip: equipment.ip.clone(),
                    message,
                };
                self.jobs.push_error(job_id, &error).await?;
            }

            // Batches never exceed SYNC_BATCH_SIZE, so the cast is lossless.
            self.jobs
                .increment_executed(job_id, batch.len() as i32)
                .await?;

            tracing::debug!(job_id, batch = index, size = batch.len(), failed, "Sync batch processed");
        }

        self.jobs.finish(job_id).await?;
        tracing::info!(job_id, equipment_id = equipment.id, "Sync job finished");
        Ok(())
    }

    async fn push_release(
        &self,
        release: &AccessRelease,
        equipment: &Equipment,
        tenant_id: DbId,
    ) -> Result<(), String> {
        let person = self
            .directory
            .person(release.person_id, tenant_id)
            .await
            .map_err(|e| e.to_string())?;
        let schedules = self
            .directory
            .work_schedules(&release.work_schedule_codes, tenant_id)
            .await
            .map_err(|e| e.to_string())?;

        let request = AddAccessRequest::grant(
            &person,
            &schedules,
            &equipment.ip,
            (release.init_date, release.end_date),
        );

        let result = bounded(self.call_timeout, &equipment.ip, self.gateway.add_access(&request)).await;
        if let Err(e) = &result {
            tracing::warn!(
                release_id = release.id,
                equipment_id = equipment.id,
                error = %e,
                "Equipment rejected access grant"
            );
        }
        result.map_err(|e| e.to_string())
    }
}

/// Apply the per-call time bound to an equipment future.
pub(crate) async fn bounded<F>(limit: Duration, ip: &str, call: F) -> Result<(), EquipmentError>
where
    F: std::future::Future<Output = Result<(), EquipmentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(EquipmentError::Timeout { ip: ip.to_string() }),
    }
}
