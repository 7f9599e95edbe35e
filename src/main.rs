//! Main entry point for the OpenLLMs Gateway

use openllms_gateway::{
    api, config::Settings, init_tracing, provider::ModelRegistry, AppState,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    init_tracing(&settings.logging);
    info!("Starting OpenLLMs Gateway");
    info!(
        "Loaded configuration: server={}:{}",
        settings.server.host, settings.server.port
    );

    // Build the provider registry once; instances live for the whole process
    let registry = ModelRegistry::from_settings(&settings);
    if registry.is_empty() {
        warn!("No providers registered, every model lookup will fail");
    }
    info!("Registered {} providers", registry.len());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app_state = Arc::new(AppState::new(settings, registry));

    // Build the router
    let app = api::routes::create_router(app_state).await;

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
