//! HTTP API handlers for logiflow-server

pub mod contracts;
pub mod customers;
pub mod health;
pub mod import;
pub mod navigation;
pub mod packages;
pub mod routes;
pub mod stops;

use axum::Router;

use crate::AppState;

pub use health::health_routes;

/// Every `/api` route; rate limiting is layered on by the caller
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(routes::route_routes())
        .merge(navigation::navigation_routes())
        .merge(stops::stop_routes())
        .merge(packages::package_routes())
        .merge(import::import_routes())
        .merge(customers::customer_routes())
        .merge(contracts::contract_routes())
}
