use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use qa_rag::api;
use qa_rag::config::Config;
use qa_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Translating queries {} -> {}, default dataset '{}'",
        config.translation.source_lang,
        config.translation.target_lang,
        config.default_dataset
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/ask", post(api::ask::ask))
        .route("/api/search", post(api::search::search))
        .route("/api/datasets", get(api::datasets::list_datasets))
        .route("/api/datasets/{tag}/ingest", post(api::datasets::ingest_records))
        .route("/api/datasets/{tag}/fetch", post(api::datasets::fetch_and_ingest))
        .route("/api/datasets/{tag}/rebuild", post(api::datasets::rebuild_dataset))
        .route(
            "/api/conversations/{id}",
            get(api::conversations::get_conversation),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
