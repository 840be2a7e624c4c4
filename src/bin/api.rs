use chain_assistant_orchestrator::{
    agent::Assistant,
    api::start_server,
    chain::http::HttpChainGateway,
    completion::gemini::GeminiClient,
    config::AppConfig,
    memory::ChatStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        warn!("⚠️  GEMINI_API_KEY not set; persona answers will fail until it is configured");
    }

    info!("🚀 Chain Assistant - API Server");
    info!("📍 Port: {}", config.port);

    // Create components
    let engine = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        config.limits.completion_timeout,
    )?);
    let gateway = Arc::new(HttpChainGateway::new(
        config.endpoints.clone(),
        config.limits.capability_timeout,
    )?);
    let chats = ChatStore::connect(config.database_url.as_deref());

    let assistant = Arc::new(Assistant::new(gateway, engine, chats, &config.limits));

    // Periodically drop idle sessions from memory
    let sweeper = assistant.clone();
    let idle_ttl = config.limits.session_idle_ttl;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            if let Err(e) = sweeper.evict_idle_sessions(idle_ttl).await {
                warn!(error = %e, "Idle session sweep failed");
            }
        }
    });

    info!("✅ Assistant initialized");
    info!("📡 Starting API server...");

    start_server(assistant, config.port).await?;

    Ok(())
}
