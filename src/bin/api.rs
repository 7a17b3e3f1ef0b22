use finance_insight_agent::{
    agent::Agent, api::start_server, capabilities::create_default_registry,
    reasoning::gemini::GeminiModel,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Finance Insight Agent - API Server");
    info!("Port: {}", api_port);

    let model = Arc::new(GeminiModel::from_env()?);
    let registry = create_default_registry();
    let agent = Arc::new(Agent::from_model(model, registry));

    info!("Agent initialized");
    info!("Starting API server...");

    start_server(agent, api_port).await?;

    Ok(())
}
