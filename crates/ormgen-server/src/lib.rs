//! ormgen HTTP/JSON server.
//!
//! Mounts the generated list/detail/create/update/delete views of an ormgen
//! catalog as JSON endpoints, one route per enabled action and model.

pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, ServerConfig};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use ormgen_core::{ActionOverrides, Site, UrlEntry};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Catalog, storage and scaffold configuration.
    pub site: Site,
    /// Routed views, sorted by model name.
    pub routes: Arc<Vec<UrlEntry>>,
    /// Server configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Create application state, routing every model in the catalog.
    pub fn new(site: Site, config: ServerConfig) -> Result<Self, ormgen_core::Error> {
        let routes = site
            .router()
            .route_all(config.action_mask, &ActionOverrides::new())?;
        Ok(Self {
            site,
            routes: Arc::new(routes),
            config,
        })
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::schema::routes())
        .merge(routes::views::routes(&state.routes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
