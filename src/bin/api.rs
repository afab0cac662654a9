use investment_advisor_orchestrator::{
    api::start_server,
    checkpoint::{CheckpointStore, InMemoryCheckpointStore, PostgresCheckpointStore},
    executor::{ExecutorConfig, GraphExecutor},
    provider::OpenAiProvider,
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Investment Advisor Orchestrator - API Server");
    info!("Port: {}", api_port);

    let provider = Arc::new(OpenAiProvider::from_env()?);

    let checkpoint_store: Arc<dyn CheckpointStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Using Postgres checkpoint store");
            Arc::new(PostgresCheckpointStore::connect(&url).await?)
        }
        Err(_) => {
            info!("DATABASE_URL not set, using in-memory checkpoint store");
            Arc::new(InMemoryCheckpointStore::new())
        }
    };

    let executor = Arc::new(GraphExecutor::new(
        provider,
        Arc::new(create_default_registry()),
        checkpoint_store,
        ExecutorConfig::default(),
    ));

    info!("Executor initialized, starting API server");

    start_server(executor, api_port).await?;

    Ok(())
}
