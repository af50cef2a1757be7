mod common;

use accessgate_api::engine::recorder::RecordAccess;
use accessgate_api::engine::release::CreateAccessRelease;
use accessgate_api::error::AppError;
use accessgate_core::directory::PUSH_ACCESS_ENTRY;
use accessgate_core::error::CoreError;
use accessgate_db::models::status::ReleaseStatus;
use assert_matches::assert_matches;
use chrono::{Duration as ChronoDuration, Utc};

use common::fakes::{ANA, BRUNO, HOST, LAB_DOOR, LOBBY, MAIN_GATE, TENANT};
use common::TestEngine;

fn attempt(person_id: i64, access_point_id: i64, direction: &str) -> RecordAccess {
    RecordAccess {
        person_id,
        access_point_id,
        direction: direction.into(),
        observation: None,
        responsible_id: None,
    }
}

fn activate_ana(harness: &TestEngine) -> i64 {
    let now = Utc::now();
    harness
        .fakes
        .store
        .insert_release(
            ANA,
            ReleaseStatus::Active,
            now - ChronoDuration::hours(1),
            now + ChronoDuration::hours(4),
        )
        .id
}

#[tokio::test]
async fn entry_is_recorded_with_snapshots_and_notifies_the_host() {
    let harness = TestEngine::new();
    let release_id = activate_ana(&harness);

    let mut input = attempt(ANA, MAIN_GATE, "entry");
    input.observation = Some("Carrying a laptop".into());
    let record = harness
        .engine
        .recorder
        .record(TENANT, Some(HOST), input)
        .await
        .unwrap();

    assert_eq!(record.release_id, release_id);
    assert_eq!(record.person.0.name, "Ana");
    assert_eq!(record.access_point.0.name, "Main gate");
    assert_eq!(record.access_point.0.area.name, "Lobby");
    assert_eq!(record.responsible.as_ref().map(|r| r.0.id), Some(HOST));
    assert_eq!(record.observation.as_deref(), Some("Carrying a laptop"));

    let sent = harness.fakes.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, PUSH_ACCESS_ENTRY);
    assert_eq!(sent[0].recipient_id, HOST);
    assert_eq!(sent[0].payload["access_control_id"], record.id);
}

#[tokio::test]
async fn exit_is_recorded_without_notification() {
    let harness = TestEngine::new();
    activate_ana(&harness);

    harness
        .engine
        .recorder
        .record(TENANT, None, attempt(ANA, MAIN_GATE, "exit"))
        .await
        .unwrap();

    assert_eq!(harness.fakes.store.controls().len(), 1);
    assert!(harness.fakes.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn attempt_without_active_release_revokes_in_background() {
    let harness = TestEngine::new();

    let err = harness
        .engine
        .recorder
        .record(TENANT, None, attempt(BRUNO, MAIN_GATE, "entry"))
        .await
        .unwrap_err();
    harness.settle().await;

    assert_matches!(
        err,
        AppError::Core(CoreError::NotFound { entity: "ActiveAccessRelease", id: BRUNO })
    );
    assert!(harness.fakes.store.controls().is_empty());
    assert_eq!(
        harness.fakes.gateway.removed_ips(),
        vec!["10.0.0.70", "10.0.0.71", "10.0.0.80"]
    );
}

#[tokio::test]
async fn point_outside_the_release_scope_is_a_conflict() {
    let harness = TestEngine::new();
    activate_ana(&harness);

    let err = harness
        .engine
        .recorder
        .record(TENANT, None, attempt(ANA, LAB_DOOR, "entry"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::Core(CoreError::Conflict(_)));
    assert!(harness.fakes.store.controls().is_empty());
}

#[tokio::test]
async fn invalid_direction_is_rejected() {
    let harness = TestEngine::new();
    activate_ana(&harness);

    let err = harness
        .engine
        .recorder
        .record(TENANT, None, attempt(ANA, MAIN_GATE, "sideways"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn records_are_listed_per_release() {
    let harness = TestEngine::new();
    let release_id = activate_ana(&harness);
    for direction in ["entry", "exit"] {
        harness
            .engine
            .recorder
            .record(TENANT, None, attempt(ANA, MAIN_GATE, direction))
            .await
            .unwrap();
    }

    let listed = harness
        .engine
        .recorder
        .list(
            TENANT,
            &accessgate_db::models::access_control::AccessControlListQuery {
                release_id: Some(release_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn regular_release_allows_repeated_entries() {
    let harness = TestEngine::new();
    let release_id = activate_ana(&harness);

    for direction in ["entry", "exit", "entry"] {
        harness
            .engine
            .recorder
            .record(TENANT, None, attempt(ANA, MAIN_GATE, direction))
            .await
            .unwrap();
    }

    assert_eq!(harness.fakes.store.controls().len(), 3);
    assert!(harness.fakes.store.release(release_id).is_active());
}

#[tokio::test]
async fn single_access_release_admits_one_entry_and_ends_on_exit() {
    let harness = TestEngine::new();
    let release = harness
        .engine
        .releases
        .create(
            TENANT,
            None,
            CreateAccessRelease {
                person_id: ANA,
                responsible_id: Some(HOST),
                area_ids: vec![LOBBY],
                access_point_id: Some(MAIN_GATE),
                release_type: "qr-code".into(),
                init_date: None,
                end_date: None,
                expiring_minutes: None,
                single_access: true,
                work_schedule_codes: vec![],
            },
        )
        .await
        .unwrap();
    harness.settle().await;
    let recorder = &harness.engine.recorder;

    recorder
        .record(TENANT, None, attempt(ANA, MAIN_GATE, "entry"))
        .await
        .unwrap();
    let err = recorder
        .record(TENANT, None, attempt(ANA, MAIN_GATE, "entry"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::Conflict(_)));
    assert!(harness.fakes.gateway.removed_ips().is_empty());

    recorder
        .record(TENANT, Some(HOST), attempt(ANA, MAIN_GATE, "exit"))
        .await
        .unwrap();
    harness.settle().await;

    let ended = harness.fakes.store.release(release.id);
    assert_eq!(ended.status_id, ReleaseStatus::Expired.id());
    assert_eq!(ended.actions.0.last().map(|a| a.action.as_str()), Some("expire"));
    assert_eq!(ended.actions.0.last().and_then(|a| a.actor), Some(HOST));
    // Every gate device except the general exit.
    assert_eq!(
        harness.fakes.gateway.removed_ips(),
        vec!["10.0.0.70", "10.0.0.71", "10.0.0.80"]
    );
    assert_eq!(harness.fakes.store.controls().len(), 2);

    let err = recorder
        .record(TENANT, None, attempt(ANA, MAIN_GATE, "entry"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Core(CoreError::NotFound { .. }));
}
