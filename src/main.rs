use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use twin_rag::api::{build_router, AppContext};
use twin_rag::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let ctx = AppContext::initialize(&config).await;
    let router = build_router(ctx, config.server.max_body_bytes);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Digital twin service listening on {}", address);
    axum::serve(listener, router).await?;

    Ok(())
}
