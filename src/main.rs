mod app;
mod console;

use anyhow::Result;
use app::App;
use helmet::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting helmet companion");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    let app = App::new(config).await?;
    app.run().await
}
