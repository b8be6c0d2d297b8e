use std::sync::Arc;

use job_tracker::{
    AppState,
    api::routes::create_router,
    config::Config,
    controller::FormController,
    llm::OpenRouterClient,
    scraper::HttpFetcher,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("job_tracker=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(
        "Starting job tracker v{} on {}",
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let completion = OpenRouterClient::new(config.openrouter_api_key.clone(), config.llm_model.clone());
    info!("Completion client initialized (model: {})", completion.model());

    let controller = Arc::new(FormController::new(
        Arc::new(config.store.clone()),
        Arc::new(HttpFetcher),
        Arc::new(completion),
        config.fetch_timeout,
    ));
    // Loads the table in the background; the first request still works if it loses the race.
    controller.spawn_warmup();

    let app = create_router(AppState { controller });

    let listener = TcpListener::bind(server_addr).await?;
    info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
