use chain_assistant_orchestrator::{
    agent::{Assistant, Reply, ResponseMode},
    chain::http::HttpChainGateway,
    completion::gemini::GeminiClient,
    config::AppConfig,
    memory::ChatStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: assistant [--wallet <address>] <message...>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;

    let mut wallet = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--wallet" {
            wallet = args.next();
        } else {
            words.push(arg);
        }
    }

    let message = words.join(" ");
    if message.trim().is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let engine = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        config.limits.completion_timeout,
    )?);
    let gateway = Arc::new(HttpChainGateway::new(
        config.endpoints.clone(),
        config.limits.capability_timeout,
    )?);
    let assistant = Assistant::new(gateway, engine, ChatStore::in_memory(), &config.limits);

    let session = assistant.create_session(wallet, None, None).await?;
    info!(session_id = %session.id, message = %message, "Running message");

    match assistant.submit(session.id, &message, ResponseMode::Complete).await? {
        Reply::Messages(reply) => {
            println!("\n=== ASSISTANT REPLY ===");
            if let Some(persona) = reply.persona {
                println!("Persona: {}", persona.display_name());
            }
            for message in &reply.messages {
                println!("[{} / {}] {}", message.sender.as_str(), message.message_type.as_str(), message.text);
            }
            if !reply.tool_results.is_empty() {
                println!("\nCapability calls ({} steps):", reply.steps);
                for (i, record) in reply.tool_results.iter().enumerate() {
                    println!("  {}: {} -> {}", i + 1, record.capability, record.result.message);
                }
            }
        }
        Reply::Stream(mut rx) => {
            while let Some(event) = rx.recv().await {
                println!("{}", event.to_sse_data()?);
            }
        }
    }

    let pending = assistant.history(session.id).await?;
    if let Some(last) = pending.last().filter(|m| m.is_gating()) {
        println!("\nPending action: {} (confirm or exit through the API)", last.message_type.as_str());
    }

    Ok(())
}
