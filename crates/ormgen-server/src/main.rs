//! ormgen HTTP/JSON server binary.

use std::sync::Arc;

use clap::Parser;
use ormgen_core::{Catalog, ScaffoldConfig, SchemaBundle, Site, SledBackend};
use ormgen_server::{create_router, AppState, Args, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = ServerConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        schema = %config.schema_path.display(),
        actions = %config.action_mask,
        "Starting ormgen server"
    );

    let bundle = SchemaBundle::load(&config.schema_path)?;
    let catalog = Catalog::from_bundle(bundle)?;
    let scaffold = ScaffoldConfig::load(config.config_path.as_deref())?;
    let backend = Arc::new(SledBackend::open(config.storage.clone())?);
    info!(
        entities = catalog.entities().count(),
        data_dir = %config.storage.path.display(),
        "Catalog and storage ready"
    );

    let site = Site::new(Arc::new(catalog), backend.clone(), Arc::new(scaffold));
    let state = AppState::new(site, config.clone())?;
    info!(routes = state.routes.len(), "Views routed");

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    backend.flush()?;
    Ok(())
}
