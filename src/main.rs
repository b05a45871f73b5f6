use chatgate::{ChatGateway, Config, spawn_sweeper};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    if config.openai_api_key().is_none() {
        tracing::warn!("OPENAI_API_KEY not set; OpenAI providers will be unavailable");
    }
    if config.webhook_url().is_none() {
        tracing::warn!("N8N_WEBHOOK_URL not set; the n8n provider will be unavailable");
    }

    let sweep_interval = config.sweep_interval();
    let gateway = Arc::new(ChatGateway::from_config(config).await?);
    let _sweeper = spawn_sweeper(gateway.sessions(), sweep_interval);

    chatgate::http::serve(gateway).await?;
    Ok(())
}
