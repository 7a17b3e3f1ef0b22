use finance_insight_agent::{
    agent::Agent, capabilities::create_default_registry, reasoning::gemini::GeminiModel,
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

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let query = if query.trim().is_empty() {
        "What is Apple's current stock price and is it overvalued?".to_string()
    } else {
        query
    };

    info!("Finance Insight Agent starting");

    let model = Arc::new(GeminiModel::from_env()?);
    let registry = create_default_registry();
    let agent = Agent::from_model(model, registry);

    info!(%query, "Running agent");

    let output = agent.answer(&query).await;

    println!("\n=== ANSWER ===");
    match &output.answer {
        Some(answer) => println!("{}", answer),
        None => println!("(no answer produced; see trace below)"),
    }
    if output.partial {
        println!("\n[note] iteration ceiling reached; answer built from partial results");
    }
    println!("\n=== RUN ===");
    println!("Run ID: {}", output.run_id);
    println!("Query kind: {:?}", output.query_kind);
    println!("Executor calls: {}", output.calls_made);
    println!("Replans: {}", output.replans);
    println!("Elapsed: {}ms", output.elapsed_ms);
    println!("\nTrace:");
    for (i, entry) in output.trace.iter().enumerate() {
        println!("  {}: {}", i + 1, entry);
    }

    Ok(())
}
