use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use accessgate_core::directory::Directory;
use accessgate_core::release::ReleasePolicy;
use accessgate_core::scheduling::ScheduleClock;
use accessgate_db::directory::PgDirectory;
use accessgate_equipment::EquipmentApi;
use accessgate_events::{NotificationBus, NotificationPersistence};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accessgate_api::background::{sweep, timers};
use accessgate_api::config::ServerConfig;
use accessgate_api::engine::{Engine, EngineSettings, EngineStores};
use accessgate_api::router::build_app_router;
use accessgate_api::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accessgate_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;

    let pool = accessgate_db::create_pool(&database_url).await?;
    tracing::info!("Database connection pool created");

    accessgate_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    accessgate_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Notifications ---
    let bus = Arc::new(NotificationBus::default());
    let persistence_handle = tokio::spawn(NotificationPersistence::run(
        pool.clone(),
        bus.subscribe(),
    ));

    // --- Collaborators ---
    let lookups = Arc::new(PgDirectory::new(pool.clone()));
    let directory = Directory {
        people: lookups.clone(),
        access_points: lookups.clone(),
        equipment: lookups.clone(),
        work_schedules: lookups,
        notifier: bus.clone(),
    };

    let equipment_timeout = Duration::from_secs(config.equipment_timeout_secs);
    let gateway = Arc::new(EquipmentApi::new(
        config.equipment_api_url.clone(),
        equipment_timeout,
    )?);
    tracing::info!(url = %config.equipment_api_url, "Equipment client configured");

    // --- Engine ---
    let clock = ScheduleClock::new(config.scheduler_utc_offset_minutes, config.timer_skew_secs)?;
    let settings = EngineSettings {
        policy: ReleasePolicy::new(
            config.release_default_validity_hours,
            config.default_work_schedule_code,
        )?,
        clock,
        equipment_timeout,
    };

    let cancel = CancellationToken::new();
    let (engine, fired) = Engine::build(
        EngineStores::postgres(pool.clone()),
        directory,
        gateway,
        settings,
        cancel.clone(),
    );

    let timer_handle = tokio::spawn(timers::run(
        engine.releases.clone(),
        fired,
        cancel.clone(),
    ));
    let sweep_handle = tokio::spawn(sweep::run(engine.releases.clone(), clock, cancel.clone()));
    tracing::info!("Scheduler started (timer runner, daily sweep)");

    // --- App ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine: engine.clone(),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    engine.timers.shutdown();
    let _ = tokio::time::timeout(grace, timer_handle).await;
    let _ = tokio::time::timeout(grace, sweep_handle).await;
    tracing::info!("Scheduler stopped");

    if tokio::time::timeout(grace, engine.sync.wait_idle()).await.is_err() {
        tracing::warn!("Sync workers still running at shutdown, their jobs stay unfinished");
    }

    // Dropping the last bus handles closes the channel and stops persistence.
    drop(engine);
    drop(bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), persistence_handle).await;
    tracing::info!("Notification persistence stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
