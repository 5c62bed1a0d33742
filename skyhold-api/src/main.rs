use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use skyhold_api::{app, AppState};
use skyhold_core::{Clock, IdempotencyLedger, ReservationStore, SystemClock};
use skyhold_store::{
    app_config::Config, DbClient, HttpInventoryClient, MemoryIdempotencyLedger, PgReservationStore,
    RedisClient, RedisIdempotencyLedger,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyhold_api=debug,skyhold_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyhold API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let store: Arc<dyn ReservationStore> = Arc::new(PgReservationStore::new(db.pool.clone()));

    let ttl = config.booking.idempotency_ttl();
    let ledger: Arc<dyn IdempotencyLedger> = match &config.redis {
        Some(redis) => {
            let client = RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?;
            Arc::new(RedisIdempotencyLedger::new(client, ttl))
        }
        None => {
            tracing::warn!("No Redis configured; idempotency records are kept in process memory");
            Arc::new(MemoryIdempotencyLedger::new(ttl))
        }
    };

    let inventory = HttpInventoryClient::new(&config.inventory.base_url, config.inventory.timeout())
        .context("Failed to build inventory client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let app_state = AppState::new(store, ledger, Arc::new(inventory), clock, &config.booking);
    app_state.sweeper.clone().spawn();

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
