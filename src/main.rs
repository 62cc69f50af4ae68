use std::env;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nurselab_backend::api::{routes, AppState};
use nurselab_backend::config::Settings;
use nurselab_backend::core::{AuthService, GradingClient, UploadService};
use nurselab_backend::infrastructure::database::{
    AttemptRepository, Database, LabRepository, UniversityRepository, UserRepository,
};
use nurselab_backend::infrastructure::jwt::JwtKeys;
use nurselab_backend::infrastructure::storage::ChunkStore;
use nurselab_backend::workers::start_cleanup_worker;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();
    info!("🚀 starting {} backend v{}", nurselab_backend::NAME, nurselab_backend::VERSION);

    let settings = Settings::load().context("failed to load configuration")?;
    info!(
        "configuration loaded (run mode: {})",
        env::var("RUN_MODE").unwrap_or_else(|_| "development".into())
    );

    let db = Database::new(&settings.database.url, settings.database.max_connections)
        .await
        .context("failed to connect to the database")?;
    db.migrate().await.context("failed to run migrations")?;

    let chunk_store = ChunkStore::new(&settings.uploads);
    chunk_store
        .ensure_dirs()
        .await
        .context("failed to prepare upload directories")?;

    let jwt = JwtKeys::new(&settings.auth.jwt_secret, settings.auth.access_ttl_hours);
    let grader = Arc::new(GradingClient::new(&settings.grading)?);
    let auth = AuthService::new(
        UserRepository::new(db.pool.clone()),
        UniversityRepository::new(db.pool.clone()),
        jwt.clone(),
    );
    auth.ensure_bootstrap_admin(&settings.auth)
        .await
        .context("failed to bootstrap the admin account")?;
    let uploads = UploadService::new(
        chunk_store.clone(),
        grader,
        Arc::new(LabRepository::new(db.pool.clone())),
        Arc::new(AttemptRepository::new(db.pool.clone())),
    );

    let _cleanup = start_cleanup_worker(
        chunk_store.clone(),
        Duration::from_secs(settings.uploads.session_ttl_minutes * 60),
    );

    let state = web::Data::new(AppState {
        db,
        settings: settings.clone(),
        jwt,
        auth,
        uploads,
        chunk_store,
    });

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("✅ listening on http://{}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .app_data(state.clone())
            .configure(routes::config)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .workers(settings.server.workers)
    .shutdown_timeout(10)
    .run()
    .await?;

    Ok(())
}

/// Structured logging: JSON in deployment, compact locally, selected by
/// `LOG_FORMAT`.
fn setup_tracing() {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".into());

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );

    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}
