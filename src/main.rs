use std::sync::Arc;

use tokio::net::TcpListener;

use talkatv::{
    config::{Config, StorageBackend},
    create_router,
    db::{MemoryStore, PgStore, Store},
    notification::make_provider,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    log::info!("Starting talkatv on port {}", config.http_port_api);

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&config.database_url)
                .await?;
            log::info!("Connected to database");

            let store = PgStore::new(pool);
            store.migrate().await?;
            log::info!("Database migrations completed");

            Arc::new(store)
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier = make_provider(&config)?;

    let app = create_router(AppState {
        store,
        notifier,
        config: config.clone(),
    })?;

    let listener = TcpListener::bind(("0.0.0.0", config.http_port_api)).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
