use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_bank_integration::api;
use rust_bank_integration::cache::{IntegrationCache, MokaIntegrationCache};
use rust_bank_integration::config::Config;
use rust_bank_integration::db::Database;
use rust_bank_integration::db_storage::PgIntegrationStorage;
use rust_bank_integration::handlers::AppState;
use rust_bank_integration::repository::{InMemoryIntegrationRepository, IntegrationRepository};
use rust_bank_integration::resilience::Resilience;
use rust_bank_integration::services::IntegrationService;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Record store (Postgres, or in memory when no database is configured).
/// - Cache region and per-operation circuit breakers.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_bank_integration=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let repository: Arc<dyn IntegrationRepository> = match config.database_url {
        Some(ref url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgIntegrationStorage::new(db.pool))
        }
        None => {
            tracing::warn!("Using in-memory record store");
            Arc::new(InMemoryIntegrationRepository::new())
        }
    };

    let cache: Arc<dyn IntegrationCache> = Arc::new(MokaIntegrationCache::new(&config.cache));
    tracing::info!("Record cache initialized: {:?}", config.cache);

    let resilience = Arc::new(Resilience::new(&config.resilience));
    tracing::info!("Circuit breakers initialized: {:?}", resilience.states());

    // Build application state
    let app_state = Arc::new(AppState {
        service: IntegrationService::new(repository, cache, resilience),
        config: config.clone(),
    });

    let app = api::router(app_state, true)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
