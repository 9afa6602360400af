use std::sync::Arc;

use axum::{Router, routing::get};
use printdesk_control::config::Config;
use printdesk_control::health::healthz;
use printdesk_control::state::AppState;
use printdesk_control::ticker::FleetTicker;
use printdesk_core::{Fleet, SystemClock};
use printdesk_db::SeaStore;
use sea_orm_migration::MigratorTrait;

async fn init_db_and_migrate(config: &Config) -> anyhow::Result<SeaStore> {
    let db = printdesk_db::connect(&config.database_url).await?;

    // Apply migrations on boot (idempotent).
    printdesk_migration::Migrator::up(&db, None).await?;

    Ok(SeaStore::new(Arc::new(db)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let store = init_db_and_migrate(&config).await?;
    let fleet = Fleet::new(Arc::new(store), Arc::new(SystemClock));

    let ticker = FleetTicker::new(fleet.clone(), config.sweep_interval);
    if config.read_only {
        tracing::warn!("read-only mode: fleet sweep disabled");
    } else {
        ticker.clone().spawn();
    }

    let addr = config.http_addr;
    let state = AppState {
        fleet,
        ticker,
        config: Arc::new(config),
    };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .with_state(state);

    tracing::info!(%addr, "printdesk-control HTTP listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
