use anyhow::Result;
use std::sync::Arc;

use sheet_explorer::{app, config, logging, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::load_config()?;

    // Initialize logging
    logging::init_logging(&config.log_level)?;

    let addr = config.addr;
    let state = Arc::new(AppState::new(config));

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
