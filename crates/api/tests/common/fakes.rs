//! In-memory stand-ins for storage, collaborators, and equipment.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use accessgate_api::engine::store::{AccessControlStore, ReleaseStore, SyncJobStore, Transition};
use accessgate_core::directory::{
    AccessPoint, AccessPointLookup, Equipment, EquipmentLookup, Person, PersonLookup,
    PushNotification, PushNotifier, WorkSchedule, WorkScheduleLookup,
};
use accessgate_core::error::CoreError;
use accessgate_core::release::ReleaseAction;
use accessgate_core::sync::SyncError;
use accessgate_core::types::{DbId, Timestamp};
use accessgate_db::models::access_control::{
    AccessControl, AccessControlListQuery, NewAccessControl,
};
use accessgate_db::models::access_release::{AccessRelease, NewAccessRelease, ReleaseListQuery};
use accessgate_db::models::status::ReleaseStatus;
use accessgate_db::models::sync_job::{NewSyncJob, SyncJob, SyncJobListQuery};
use accessgate_db::repositories::CreateOutcome;
use accessgate_equipment::messages::{
    AddAccessRequest, RemoveAccessRequest, WeekPlanTemplateRequest, WorkScheduleRequest,
};
use accessgate_equipment::{EquipmentError, EquipmentGateway};
use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use sqlx::types::Json;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    releases: Mutex<Vec<AccessRelease>>,
    jobs: Mutex<Vec<SyncJob>>,
    controls: Mutex<Vec<AccessControl>>,
    /// `(job_id, executed_numbers)` after every increment, in order.
    pub progress_log: Mutex<Vec<(DbId, i32)>>,
    /// Person whose rival release commits as active just before the next
    /// activation is written.
    rival_activation: Mutex<Option<DbId>>,
}

impl MemoryStore {
    pub fn release(&self, id: DbId) -> AccessRelease {
        self.releases
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .expect("release exists")
    }

    pub fn all_releases(&self) -> Vec<AccessRelease> {
        self.releases.lock().unwrap().clone()
    }

    pub fn jobs(&self) -> Vec<SyncJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<AccessControl> {
        self.controls.lock().unwrap().clone()
    }

    /// Insert a release directly, bypassing the engine.
    pub fn insert_release(
        &self,
        person_id: DbId,
        status: ReleaseStatus,
        init_date: Timestamp,
        end_date: Timestamp,
    ) -> AccessRelease {
        seed_release(
            &mut self.releases.lock().unwrap(),
            person_id,
            status,
            init_date,
            end_date,
        )
    }

    /// Move a release's window, standing in for the clock reaching it.
    pub fn move_window(&self, id: DbId, init_date: Timestamp, end_date: Timestamp) {
        let mut releases = self.releases.lock().unwrap();
        let release = releases
            .iter_mut()
            .find(|r| r.id == id)
            .expect("release exists");
        release.init_date = init_date;
        release.end_date = end_date;
    }

    /// Let another release of `person_id` become active between the
    /// engine's conflict check and its next activation write.
    pub fn activate_rival_before_next_activation(&self, person_id: DbId) {
        *self.rival_activation.lock().unwrap() = Some(person_id);
    }
}

fn seed_release(
    releases: &mut Vec<AccessRelease>,
    person_id: DbId,
    status: ReleaseStatus,
    init_date: Timestamp,
    end_date: Timestamp,
) -> AccessRelease {
    let now = Utc::now();
    let release = AccessRelease {
        id: releases.len() as DbId + 1,
        tenant_id: TENANT,
        person_id,
        person_type_id: VISITOR_TYPE,
        responsible_id: Some(HOST),
        area_ids: vec![LOBBY],
        access_point_id: Some(MAIN_GATE),
        release_type: "manual".into(),
        status_id: status.id(),
        init_date,
        end_date,
        single_access: false,
        work_schedule_codes: vec![1],
        invitation_id: None,
        actions: Json(vec![ReleaseAction::new("create", now, None)]),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };
    releases.push(release.clone());
    release
}

fn active_for(releases: &[AccessRelease], person_id: DbId, tenant_id: DbId) -> Option<&AccessRelease> {
    releases.iter().find(|r| {
        r.person_id == person_id && r.tenant_id == tenant_id && r.status_id == ReleaseStatus::Active.id()
    })
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn create_scheduled(
        &self,
        input: &NewAccessRelease,
    ) -> Result<CreateOutcome, sqlx::Error> {
        let mut releases = self.releases.lock().unwrap();
        if let Some(active) = active_for(&releases, input.person_id, input.tenant_id) {
            return Ok(CreateOutcome::ActiveExists(active.id));
        }
        let now = Utc::now();
        let release = AccessRelease {
            id: releases.len() as DbId + 1,
            tenant_id: input.tenant_id,
            person_id: input.person_id,
            person_type_id: input.person_type_id,
            responsible_id: input.responsible_id,
            area_ids: input.area_ids.clone(),
            access_point_id: input.access_point_id,
            release_type: input.release_type.clone(),
            status_id: ReleaseStatus::Scheduled.id(),
            init_date: input.init_date,
            end_date: input.end_date,
            single_access: input.single_access,
            work_schedule_codes: input.work_schedule_codes.clone(),
            invitation_id: input.invitation_id,
            actions: Json(vec![input.created.clone()]),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        releases.push(release.clone());
        Ok(CreateOutcome::Created(release))
    }

    async fn find_by_id(
        &self,
        id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_id_unscoped(&self, id: DbId) -> Result<Option<AccessRelease>, sqlx::Error> {
        Ok(self.releases.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_active_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Option<AccessRelease>, sqlx::Error> {
        Ok(active_for(&self.releases.lock().unwrap(), person_id, tenant_id).cloned())
    }

    async fn list_open_for_person(
        &self,
        person_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.person_id == person_id
                    && r.tenant_id == tenant_id
                    && (r.is_scheduled() || r.is_active())
            })
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &ReleaseListQuery,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        let mut found: Vec<_> = self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| params.person_id.is_none_or(|p| r.person_id == p))
            .filter(|r| match params.status_id {
                Some(status) => r.status_id == status,
                None => r.status_id != ReleaseStatus::Deleted.id(),
            })
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn transition(
        &self,
        id: DbId,
        from: ReleaseStatus,
        to: ReleaseStatus,
        action: &ReleaseAction,
    ) -> Result<Transition, sqlx::Error> {
        let mut releases = self.releases.lock().unwrap();
        let Some(index) = releases
            .iter()
            .position(|r| r.id == id && r.status_id == from.id())
        else {
            return Ok(Transition::Stale);
        };
        if to == ReleaseStatus::Active {
            if let Some(person_id) = self.rival_activation.lock().unwrap().take() {
                let (init, end) = (releases[index].init_date, releases[index].end_date);
                seed_release(&mut releases, person_id, ReleaseStatus::Active, init, end);
            }
            let target = &releases[index];
            if active_for(&releases, target.person_id, target.tenant_id).is_some() {
                return Ok(Transition::ActiveExists);
            }
        }
        let release = &mut releases[index];
        release.status_id = to.id();
        release.actions.0.push(action.clone());
        release.updated_at = Utc::now();
        if to == ReleaseStatus::Deleted {
            release.deleted_at = Some(Utc::now());
        }
        Ok(Transition::Applied(release.clone()))
    }

    async fn list_due_activations(
        &self,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_scheduled() && r.init_date < before)
            .cloned()
            .collect())
    }

    async fn list_due_expirations(
        &self,
        before: Timestamp,
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| (r.is_scheduled() || r.is_active()) && r.end_date < before)
            .cloned()
            .collect())
    }

    async fn list_active_by_person_types(
        &self,
        tenant_id: DbId,
        person_type_ids: &[DbId],
    ) -> Result<Vec<AccessRelease>, sqlx::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.is_active()
                    && person_type_ids.contains(&r.person_type_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SyncJobStore for MemoryStore {
    async fn create(&self, input: &NewSyncJob) -> Result<SyncJob, sqlx::Error> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = SyncJob {
            id: jobs.len() as DbId + 1,
            tenant_id: input.tenant_id,
            equipment_id: input.equipment_id,
            person_type_ids: input.person_type_ids.clone(),
            total_docs: input.total_docs,
            executed_numbers: 0,
            sync_errors: Json(Vec::new()),
            finished: false,
            end_date: None,
            created_at: Utc::now(),
        };
        jobs.push(job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<SyncJob>, sqlx::Error> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id && j.tenant_id == tenant_id)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &SyncJobListQuery,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.tenant_id == tenant_id)
            .filter(|j| params.equipment_id.is_none_or(|e| j.equipment_id == e))
            .cloned()
            .collect())
    }

    async fn increment_executed(&self, id: DbId, count: i32) -> Result<(), sqlx::Error> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.executed_numbers += count;
            self.progress_log
                .lock()
                .unwrap()
                .push((id, job.executed_numbers));
        }
        Ok(())
    }

    async fn push_error(&self, id: DbId, error: &SyncError) -> Result<(), sqlx::Error> {
        if let Some(job) = self.jobs.lock().unwrap().iter_mut().find(|j| j.id == id) {
            job.sync_errors.0.push(error.clone());
        }
        Ok(())
    }

    async fn finish(&self, id: DbId) -> Result<(), sqlx::Error> {
        if let Some(job) = self.jobs.lock().unwrap().iter_mut().find(|j| j.id == id) {
            if !job.finished {
                job.finished = true;
                job.end_date = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccessControlStore for MemoryStore {
    async fn create(&self, input: &NewAccessControl) -> Result<AccessControl, sqlx::Error> {
        let mut controls = self.controls.lock().unwrap();
        let record = AccessControl {
            id: controls.len() as DbId + 1,
            tenant_id: input.tenant_id,
            release_id: input.release_id,
            person: Json(input.person.clone()),
            access_point: Json(input.access_point.clone()),
            responsible: input.responsible.clone().map(Json),
            direction: input.direction.clone(),
            observation: input.observation.clone(),
            actions: Json(vec![input.created.clone()]),
            created_at: Utc::now(),
        };
        controls.push(record.clone());
        Ok(record)
    }

    async fn list(
        &self,
        tenant_id: DbId,
        params: &AccessControlListQuery,
    ) -> Result<Vec<AccessControl>, sqlx::Error> {
        Ok(self
            .controls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| params.release_id.is_none_or(|r| c.release_id == r))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

pub const TENANT: DbId = 1;
pub const VISITOR_TYPE: DbId = 10;
pub const ANA: DbId = 100;
pub const BRUNO: DbId = 101;
pub const HOST: DbId = 102;
pub const LOBBY: DbId = 1;
pub const LAB: DbId = 2;
pub const MAIN_GATE: DbId = 7;
pub const LAB_DOOR: DbId = 8;
pub const LOBBY_EXIT: DbId = 9;

pub struct FakeDirectory {
    pub people: Mutex<HashMap<DbId, Person>>,
    pub points: Mutex<Vec<AccessPoint>>,
    pub entitlements: Mutex<HashMap<DbId, Vec<DbId>>>,
    pub equipment: Mutex<HashMap<DbId, Equipment>>,
    pub schedules: Vec<WorkSchedule>,
}

fn person(id: DbId, name: &str) -> Person {
    Person {
        id,
        tenant_id: TENANT,
        person_type_id: VISITOR_TYPE,
        person_type_name: Some("Visitor".into()),
        name: name.into(),
        code: Some(format!("P-{id}")),
        picture_url: None,
        category: None,
    }
}

fn point(id: DbId, area_id: DbId, name: &str, general_exit: bool, equipment_ids: Vec<DbId>) -> AccessPoint {
    AccessPoint {
        id,
        tenant_id: TENANT,
        name: name.into(),
        area_id,
        area_name: if area_id == LOBBY { "Lobby" } else { "Lab" }.into(),
        general_exit,
        equipment_ids,
    }
}

fn device(id: DbId) -> Equipment {
    Equipment {
        id,
        tenant_id: TENANT,
        name: format!("Controller {id}"),
        ip: format!("10.0.0.{id}"),
    }
}

impl FakeDirectory {
    /// Lobby: Main gate (70, 71) and a general exit (90). Lab: Lab door (80).
    /// Visitors are entitled to all three points.
    pub fn seeded() -> Self {
        let people = [person(ANA, "Ana"), person(BRUNO, "Bruno"), person(HOST, "Carla")]
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let points = vec![
            point(MAIN_GATE, LOBBY, "Main gate", false, vec![70, 71]),
            point(LAB_DOOR, LAB, "Lab door", false, vec![80]),
            point(LOBBY_EXIT, LOBBY, "Lobby exit", true, vec![90]),
        ];
        let equipment = [70, 71, 80, 90]
            .into_iter()
            .map(|id| (id, device(id)))
            .collect();
        let schedules = vec![WorkSchedule {
            id: 1,
            tenant_id: TENANT,
            code: 1,
            name: "Full time".into(),
            days: vec![1, 2, 3, 4, 5, 6, 7],
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        }];
        Self {
            people: Mutex::new(people),
            points: Mutex::new(points),
            entitlements: Mutex::new(HashMap::from([(VISITOR_TYPE, vec![MAIN_GATE, LAB_DOOR, LOBBY_EXIT])])),
            equipment: Mutex::new(equipment),
            schedules,
        }
    }

    /// Add `count` extra visitors with ids starting at 1000.
    pub fn add_people(&self, count: usize) -> Vec<DbId> {
        let mut people = self.people.lock().unwrap();
        (0..count)
            .map(|i| {
                let id = 1000 + i as DbId;
                people.insert(id, person(id, &format!("Visitor {i}")));
                id
            })
            .collect()
    }
}

#[async_trait]
impl PersonLookup for FakeDirectory {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Person>, CoreError> {
        Ok(self
            .people
            .lock()
            .unwrap()
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .cloned())
    }
}

#[async_trait]
impl AccessPointLookup for FakeDirectory {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<AccessPoint>, CoreError> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_all_by_person_type_id(
        &self,
        person_type_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError> {
        let ids = self
            .entitlements
            .lock()
            .unwrap()
            .get(&person_type_id)
            .cloned()
            .unwrap_or_default();
        Ok(self
            .points
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.tenant_id == tenant_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_all_by_area_id(
        &self,
        area_id: DbId,
        tenant_id: DbId,
    ) -> Result<Vec<AccessPoint>, CoreError> {
        Ok(self
            .points
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.area_id == area_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EquipmentLookup for FakeDirectory {
    async fn find_by_id(&self, id: DbId, tenant_id: DbId) -> Result<Option<Equipment>, CoreError> {
        Ok(self
            .equipment
            .lock()
            .unwrap()
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }
}

#[async_trait]
impl WorkScheduleLookup for FakeDirectory {
    async fn find_all(&self, tenant_id: DbId) -> Result<Vec<WorkSchedule>, CoreError> {
        Ok(self
            .schedules
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn find_by_code(
        &self,
        code: i32,
        tenant_id: DbId,
    ) -> Result<Option<WorkSchedule>, CoreError> {
        Ok(self
            .schedules
            .iter()
            .find(|s| s.code == code && s.tenant_id == tenant_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<PushNotification>>,
}

impl PushNotifier for RecordingNotifier {
    fn notify(&self, notification: PushNotification) {
        self.sent.lock().unwrap().push(notification);
    }
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeGateway {
    pub adds: Mutex<Vec<AddAccessRequest>>,
    pub removes: Mutex<Vec<RemoveAccessRequest>>,
    pub templates: Mutex<Vec<WeekPlanTemplateRequest>>,
    pub schedules: Mutex<Vec<WorkScheduleRequest>>,
    add_calls: AtomicUsize,
    /// Reject every n-th `add_access` call (1-based).
    pub reject_every: Option<usize>,
    /// Devices that reject every command.
    pub failing_ips: Mutex<HashSet<String>>,
    /// Devices that fail health checks.
    pub unreachable_ips: Mutex<HashSet<String>>,
    /// Devices that never answer.
    pub hanging_ips: Mutex<HashSet<String>>,
}

impl FakeGateway {
    pub fn rejecting_every(n: usize) -> Self {
        Self {
            reject_every: Some(n),
            ..Self::default()
        }
    }

    pub fn fail_ip(&self, ip: &str) {
        self.failing_ips.lock().unwrap().insert(ip.to_string());
    }

    pub fn hang_ip(&self, ip: &str) {
        self.hanging_ips.lock().unwrap().insert(ip.to_string());
    }

    pub fn add_ips(&self) -> Vec<String> {
        let mut ips: Vec<_> = self.adds.lock().unwrap().iter().map(|r| r.ip.clone()).collect();
        ips.sort();
        ips
    }

    pub fn removed_ips(&self) -> Vec<String> {
        let mut ips: Vec<_> = self
            .removes
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.ip.clone())
            .collect();
        ips.sort();
        ips
    }

    async fn answer(&self, ip: &str) -> Result<(), EquipmentError> {
        if self.hanging_ips.lock().unwrap().contains(ip) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing_ips.lock().unwrap().contains(ip) {
            return Err(rejected(ip));
        }
        Ok(())
    }
}

fn rejected(ip: &str) -> EquipmentError {
    EquipmentError::Rejected {
        ip: ip.to_string(),
        status: 200,
        code: Some(500),
        body: r#"{"code":500,"message":"device busy"}"#.into(),
    }
}

#[async_trait]
impl EquipmentGateway for FakeGateway {
    async fn add_access(&self, request: &AddAccessRequest) -> Result<(), EquipmentError> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_every.is_some_and(|n| call % n == 0) {
            return Err(rejected(&request.ip));
        }
        self.answer(&request.ip).await?;
        self.adds.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn remove_access(&self, request: &RemoveAccessRequest) -> Result<(), EquipmentError> {
        self.answer(&request.ip).await?;
        self.removes.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn add_week_plan_template(
        &self,
        request: &WeekPlanTemplateRequest,
    ) -> Result<(), EquipmentError> {
        self.answer(&request.ip).await?;
        self.templates.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn add_work_schedule(&self, request: &WorkScheduleRequest) -> Result<(), EquipmentError> {
        self.answer(&request.ip).await?;
        self.schedules.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn health_check(&self, ip: &str) -> Result<(), EquipmentError> {
        if self.unreachable_ips.lock().unwrap().contains(ip) {
            return Err(EquipmentError::Timeout { ip: ip.to_string() });
        }
        Ok(())
    }
}

/// Shared handle bundle for engine tests.
pub struct Fakes {
    pub store: Arc<MemoryStore>,
    pub directory: Arc<FakeDirectory>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fakes {
    pub fn new(gateway: FakeGateway) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            directory: Arc::new(FakeDirectory::seeded()),
            gateway: Arc::new(gateway),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }
}
