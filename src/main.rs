//! Itinerary Wizard - guided trip planning backed by Gemini
//!
//! A Rust backend implementing an interview state machine that collects
//! trip details, asks a fixed list of questions, and turns the answers into
//! a single itinerary generation request.

mod api;
mod config;
mod llm;
mod prompt;
mod runtime;
mod state_machine;
mod trip;

use api::{create_router, AppState};
use config::AppConfig;
use llm::ModelRegistry;
use runtime::spawn_idle_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itinerary_wizard=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            "No Gemini credentials configured. Set GEMINI_API_KEY or LLM_GATEWAY; \
             itinerary generation will fail until then."
        );
    }

    // Create application state
    let state = AppState::new(llm_registry, config.generation_timeout);
    spawn_idle_sweeper(state.runtime.clone(), config.session_idle);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        generation_timeout_secs = config.generation_timeout.as_secs(),
        session_idle_secs = config.session_idle.as_secs(),
        "Itinerary wizard listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
