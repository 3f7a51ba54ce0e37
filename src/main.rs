use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use corep_core::CoreConfig;

/// Main entry point for the COREP reporting assistant
///
/// Loads the document store snapshot, builds the configured reasoning strategy and serves
/// the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `COREP_REST_ADDR`: REST server address (default: "0.0.0.0:8000")
/// - `COREP_STORE_PATH`: document store snapshot (default: "data/document_store.json")
/// - `COREP_REASONING_MODE`: `heuristic` (default) or `llm`
/// - `COREP_LLM_PROVIDER`, `COREP_LLM_MODEL`, `COREP_LLM_API_KEY`: model backend settings
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid, the snapshot cannot be read or the
///   address cannot be bound
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corep=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    tracing::info!(
        "reasoning mode {}, store {}",
        config.reasoning_mode(),
        config.store_path().display()
    );

    let state = AppState::from_config(&config).await?;
    api_rest::serve(config.rest_addr(), state).await
}
