mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::auth::{AppState, AppStateInner};
use agora_api::routes::router;
use agora_db::{Database, Repository};
use agora_gateway::Hub;
use agora_token::TokenAuthority;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db: Arc<dyn Repository> = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let hub = Hub::spawn(db.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenAuthority::new(&config.token_key)?,
        hub,
        session: config.session.clone(),
    });

    let app = router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!(
        "Agora server listening on {} ({})",
        addr,
        if config.production { "production" } else { "development" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
