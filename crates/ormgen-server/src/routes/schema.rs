//! Schema and route listing endpoints.

use axum::{extract::State, routing::get, Json, Router};
use ormgen_core::SchemaBundle;

use crate::json::{RouteJson, SuccessResponse};
use crate::AppState;

/// Schema routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/schema", get(handle_get_schema))
        .route("/routes", get(handle_list_routes))
}

async fn handle_get_schema(State(state): State<AppState>) -> Json<SuccessResponse<SchemaBundle>> {
    Json(SuccessResponse::new(state.site.catalog.bundle().clone()))
}

async fn handle_list_routes(State(state): State<AppState>) -> Json<SuccessResponse<Vec<RouteJson>>> {
    let routes = state.routes.iter().map(RouteJson::from).collect();
    Json(SuccessResponse::new(routes))
}
