mod config;
mod db;
mod documents;
mod errors;
mod extraction;
mod facts;
mod llm_client;
mod models;
mod reconcile;
mod routes;
mod state;
mod templates;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::extraction::gateway::LlmFactExtractor;
use crate::llm_client::LlmClient;
use crate::reconcile::session::SessionStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::store::TemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Proposal API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite and run migrations
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client and the extraction gateway on top of it
    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        &config.openai_base_url,
        Duration::from_secs(config.llm_timeout_secs),
    );
    info!(
        "LLM client initialized (model: {}, base url: {})",
        llm.model(),
        config.openai_base_url
    );
    let extractor = Arc::new(LlmFactExtractor::new(llm));

    let templates = TemplateStore::new(&config.template_dir, &config.output_dir);
    info!(
        "Templates from {}, proposals written to {}",
        config.template_dir.display(),
        config.output_dir.display()
    );

    let state = AppState {
        db,
        extractor,
        templates,
        sessions: SessionStore::default(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
