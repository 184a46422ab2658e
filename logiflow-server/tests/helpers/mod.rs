//! Shared setup for logiflow-server integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use logiflow_server::rate_limit::GovernorRateLimiter;
use logiflow_server::{build_router, AppState};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

/// In-memory database with the full schema
///
/// A single connection so every query sees the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");

    logiflow_common::db::init_schema(&pool)
        .await
        .expect("Should create schema");
    pool
}

/// Router plus direct database access
pub struct TestApp {
    pub pool: SqlitePool,
    router: Router,
}

impl TestApp {
    /// App with a quota high enough never to interfere
    pub async fn new() -> Self {
        Self::with_limiter(GovernorRateLimiter::new(100_000, 10_000)).await
    }

    pub async fn with_limiter(limiter: GovernorRateLimiter) -> Self {
        let pool = test_pool().await;
        let router = build_router(AppState::new(pool.clone(), Arc::new(limiter)));
        Self { pool, router }
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(json_request(method, uri, body)).await;
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, None).await
    }

    /// Create an empty Draft route and return its JSON
    pub async fn create_route(&self, body: Value) -> Value {
        let (status, route) = self.post("/api/routes", body).await;
        assert_eq!(status, StatusCode::CREATED, "create route: {}", route);
        route
    }

    /// Add a stop with `packages` inline packages and return its JSON
    pub async fn add_stop(&self, route_id: &str, address: &str, packages: usize) -> Value {
        let packages: Vec<Value> = (0..packages)
            .map(|i| serde_json::json!({ "description": format!("Parcel {}", i + 1) }))
            .collect();
        let (status, stop) = self
            .post(
                &format!("/api/routes/{}/stops", route_id),
                serde_json::json!({
                    "recipient_name": "Jeanne Martin",
                    "address": address,
                    "city": "Paris",
                    "postal_code": "75001",
                    "packages": packages,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "add stop: {}", stop);
        stop
    }

    pub async fn route(&self, route_id: &str) -> Value {
        let (status, route) = self.get(&format!("/api/routes/{}", route_id)).await;
        assert_eq!(status, StatusCode::OK, "get route: {}", route);
        route
    }
}

pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Response body as JSON; `Null` for an empty body
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Stop numbers of a route detail, in returned order
pub fn stop_numbers(route: &Value) -> Vec<i64> {
    route["stops"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stop_number"].as_i64().unwrap())
        .collect()
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}
