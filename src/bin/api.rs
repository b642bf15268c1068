use stash_agent::{
    agent::Orchestrator,
    api::{start_server, ApiState},
    auth::build_verifier,
    config::AppConfig,
    context::SystemClock,
    llm::GeminiClient,
    state::build_store,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; chat requests will fail until it is configured");
    }

    info!("Stash Agent - API Server");
    info!(port = config.port, model = %config.gemini_model, "Configuration loaded");

    // Create components
    let store = build_store(&config);
    let verifier = build_verifier(&config);
    let model = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
    ));

    let orchestrator = Arc::new(Orchestrator::new(model, store, Arc::new(SystemClock)));

    info!("Orchestrator initialized");

    start_server(
        ApiState {
            orchestrator,
            verifier,
        },
        config.port,
    )
    .await?;

    Ok(())
}
