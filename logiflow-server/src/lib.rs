//! logiflow-server library
//!
//! HTTP API over the route / stop / package delivery model: route
//! building, delivery actions, structural edits while a route is a draft,
//! bulk import, navigation links, and the customer/contract records
//! packages are billed under.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod actor;
pub mod api;
pub mod db;
pub mod error;
pub mod extract;
pub mod pagination;
pub mod rate_limit;
pub mod services;

pub use error::{ApiError, ApiResult};
use rate_limit::RateLimiter;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Quota store consulted for mutating requests
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(db: SqlitePool, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self { db, rate_limiter }
    }
}

/// Build application router
///
/// `/health` is public and never rate limited; everything under `/api`
/// goes through the per-actor quota check.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let api = api::api_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit::rate_limit_middleware,
    ));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
