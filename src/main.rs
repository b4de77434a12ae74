use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tripjournal::config::AppConfig;
use tripjournal::db::{init_pool, run_migrations};
use tripjournal::error::AppError;
use tripjournal::routes::create_router;
use tripjournal::services::{mailer::LogMailer, snapshots::SnapshotHub, storage::StorageService};
use tripjournal::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = run_migrations(&db).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let storage = StorageService::new(config.data_root.clone(), SnapshotHub::new());
    storage.ensure_structure().await?;

    let state = AppState::new(config.clone(), db.clone(), storage, Arc::new(LogMailer));

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tripjournal=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
