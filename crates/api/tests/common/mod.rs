#![allow(dead_code)]

pub mod fakes;

use std::sync::Arc;
use std::time::Duration;

use accessgate_api::background::timers::TimerKey;
use accessgate_api::config::ServerConfig;
use accessgate_api::engine::{Engine, EngineSettings, EngineStores};
use accessgate_api::router::build_app_router;
use accessgate_api::state::AppState;
use accessgate_core::directory::Directory;
use accessgate_core::release::ReleasePolicy;
use accessgate_core::scheduling::ScheduleClock;
use accessgate_db::directory::PgDirectory;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fakes::{FakeGateway, Fakes, TENANT};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".into()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        equipment_api_url: "http://127.0.0.1:9".into(),
        equipment_timeout_secs: 1,
        release_default_validity_hours: 24,
        default_work_schedule_code: 1,
        scheduler_utc_offset_minutes: 0,
        timer_skew_secs: 0,
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        policy: ReleasePolicy::default(),
        clock: ScheduleClock::new(0, 0).expect("valid clock"),
        equipment_timeout: Duration::from_millis(200),
    }
}

/// An engine wired entirely against in-memory fakes.
pub struct TestEngine {
    pub engine: Engine,
    pub fakes: Fakes,
    pub fired: Option<UnboundedReceiver<TimerKey>>,
    pub cancel: CancellationToken,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::default())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let fakes = Fakes::new(gateway);
        let directory = Directory {
            people: fakes.directory.clone(),
            access_points: fakes.directory.clone(),
            equipment: fakes.directory.clone(),
            work_schedules: fakes.directory.clone(),
            notifier: fakes.notifier.clone(),
        };
        let stores = EngineStores {
            releases: fakes.store.clone(),
            jobs: fakes.store.clone(),
            controls: fakes.store.clone(),
        };
        let cancel = CancellationToken::new();
        let (engine, fired) = Engine::build(
            stores,
            directory,
            fakes.gateway.clone(),
            test_settings(),
            cancel.clone(),
        );
        Self {
            engine,
            fakes,
            fired: Some(fired),
            cancel,
        }
    }

    /// Start applying fired timers in the background.
    pub fn spawn_timer_runner(&mut self) {
        let fired = self.fired.take().expect("timer runner already started");
        tokio::spawn(accessgate_api::background::timers::run(
            self.engine.releases.clone(),
            fired,
            self.cancel.clone(),
        ));
    }

    pub async fn settle(&self) {
        self.engine.sync.wait_idle().await;
    }
}

impl Drop for TestEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application router over a real database, the Postgres
/// directory, and a fake equipment gateway.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_gateway(pool, Arc::new(FakeGateway::default()))
}

pub fn build_test_app_with_gateway(pool: PgPool, gateway: Arc<FakeGateway>) -> Router {
    let config = test_config();
    let lookups = Arc::new(PgDirectory::new(pool.clone()));
    let directory = Directory {
        people: lookups.clone(),
        access_points: lookups.clone(),
        equipment: lookups.clone(),
        work_schedules: lookups,
        notifier: Arc::new(fakes::RecordingNotifier::default()),
    };
    let (engine, _fired) = Engine::build(
        EngineStores::postgres(pool.clone()),
        directory,
        gateway,
        test_settings(),
        CancellationToken::new(),
    );
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn tenant_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", TENANT.to_string())
        .header("x-actor-id", "1")
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = tenant_request("GET", uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = tenant_request("POST", uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = tenant_request("DELETE", uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}
