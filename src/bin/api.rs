use finance_chat_orchestrator::{api::start_server, build_chat_service, config::AppConfig};
use std::sync::Arc;
use tracing::info;
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

    info!("Finance Chat Orchestrator - API Server");
    info!(
        port = config.port,
        mock_data_dir = %config.mock_data_dir.display(),
        llm = config.llm.is_some(),
        max_iterations = config.max_dispatch_iterations,
        "Configuration loaded"
    );

    let service = Arc::new(build_chat_service(&config)?);

    info!("Chat service initialized, starting API server");

    start_server(service, config.port).await?;

    Ok(())
}
