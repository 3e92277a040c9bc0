use boardcast::{
    build_router,
    cache::{CacheProvider, InMemoryCacheProvider, RedisCacheProvider},
    session::{PostgresSessionRepository, SeedData, SessionRepository},
    AppConfig, AppState, DisconnectEffects, EventBus, Hub, HubHandle, SessionService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting boardcast real-time server");

    let config = AppConfig::from_env();

    let session_repository: Arc<dyn SessionRepository + Send + Sync> = match &config.database_url
    {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url)
                .await
                .expect("Failed to connect to database");
            info!("Using PostgreSQL session store");
            Arc::new(PostgresSessionRepository::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory session store");
            let seed = SeedData::load(config.seed_file.as_deref())
                .await
                .expect("Failed to load seed data");
            Arc::new(seed.into_repository())
        }
    };

    let cache: Arc<dyn CacheProvider> = match &config.redis_url {
        Some(redis_url) => {
            let provider = RedisCacheProvider::connect(redis_url)
                .await
                .expect("Failed to connect to Redis");
            info!("Using Redis cache");
            Arc::new(provider)
        }
        None => {
            warn!("REDIS_URL not set, using in-memory cache");
            Arc::new(InMemoryCacheProvider::new())
        }
    };

    let session_service = Arc::new(SessionService::new(session_repository));
    let event_bus = EventBus::new(config.event_queue_capacity);
    let effects = DisconnectEffects::new(session_service.clone(), cache, config.cache_timeout);
    let (hub, hub_handle) = Hub::new(&event_bus, effects).expect("Event stream already taken");
    let hub_task = hub.spawn();

    let app_state = AppState::new(
        session_service,
        event_bus,
        hub_handle.clone(),
        config.clone(),
    );
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server_port))
        .await
        .expect("Failed to bind listener");
    info!("Server running on http://localhost:{}", config.server_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub_handle))
        .await
        .expect("Server error");

    match tokio::time::timeout(config.shutdown_grace, hub_task).await {
        Ok(_) => info!("Shutdown complete"),
        Err(_) => warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Connections still open after grace period, exiting"
        ),
    }
}

/// Resolves on ctrl-c, after telling the hub to close every connection
async fn shutdown_signal(hub: HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    info!("Shutting down...");
    hub.shutdown();
}
