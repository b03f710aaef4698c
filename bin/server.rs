// Gym Insight - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use gym_insight::api::{router, AppState};
use gym_insight::{init_tracing, open, setup_database, Config, GroqClient};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    // Open database
    let conn = open(&config.database_path)?;
    setup_database(&conn)?;
    info!(path = %config.database_path.display(), "database opened");

    if config.llm.api_key.is_none() {
        warn!("GROQ_API_KEY is not set; chat and insights will use fallback replies");
    }
    let llm = GroqClient::new(&config.llm)?;

    // Create shared state
    let state = AppState::new(
        conn,
        Arc::new(llm),
        config.assumptions.clone(),
        config.insight_cache_ttl,
    );

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid GYM_CORS_ORIGIN {:?}", config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = router(state).layer(cors);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "🚀 gym-server listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
