//! Access-release lifecycle engine.
//!
//! - [`release`]: the release state machine service
//! - [`conflict`]: one-active-release checks
//! - [`sync`] / [`sync_worker`]: equipment fan-out and revocation
//! - [`recorder`]: entry/exit records
//! - [`store`]: persistence seams with the Postgres implementation

pub mod conflict;
pub mod recorder;
pub mod release;
pub mod store;
pub mod sync;
pub mod sync_worker;

use std::sync::Arc;
use std::time::Duration;

use accessgate_core::directory::Directory;
use accessgate_core::release::ReleasePolicy;
use accessgate_core::scheduling::ScheduleClock;
use accessgate_db::DbPool;
use accessgate_equipment::EquipmentGateway;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::background::timers::{TimerKey, TransitionTimers};
use recorder::AccessControlRecorder;
use release::ReleaseService;
use store::{AccessControlStore, PgStore, ReleaseStore, SyncJobStore};
use sync::SyncCoordinator;

/// Storage backends the engine runs against.
#[derive(Clone)]
pub struct EngineStores {
    pub releases: Arc<dyn ReleaseStore>,
    pub jobs: Arc<dyn SyncJobStore>,
    pub controls: Arc<dyn AccessControlStore>,
}

impl EngineStores {
    pub fn postgres(pool: DbPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            releases: store.clone(),
            jobs: store.clone(),
            controls: store,
        }
    }
}

/// Tunables resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub policy: ReleasePolicy,
    pub clock: ScheduleClock,
    pub equipment_timeout: Duration,
}

/// The wired services. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub releases: ReleaseService,
    pub sync: SyncCoordinator,
    pub recorder: AccessControlRecorder,
    pub timers: Arc<TransitionTimers>,
}

impl Engine {
    /// Wire every service. The returned receiver must be handed to
    /// [`crate::background::timers::run`] for timers to take effect.
    pub fn build(
        stores: EngineStores,
        directory: Directory,
        gateway: Arc<dyn EquipmentGateway>,
        settings: EngineSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TimerKey>) {
        let (timers, fired) = TransitionTimers::new(settings.clock, cancel);
        let timers = Arc::new(timers);

        let sync = SyncCoordinator::new(
            Arc::clone(&stores.jobs),
            Arc::clone(&stores.releases),
            directory.clone(),
            gateway,
            settings.equipment_timeout,
        );
        let releases = ReleaseService::new(
            Arc::clone(&stores.releases),
            directory.clone(),
            sync.clone(),
            Arc::clone(&timers),
            settings.policy,
        );
        let recorder = AccessControlRecorder::new(
            stores.controls,
            stores.releases,
            directory,
            sync.clone(),
            releases.clone(),
        );

        let engine = Self {
            releases,
            sync,
            recorder,
            timers,
        };
        (engine, fired)
    }
}
