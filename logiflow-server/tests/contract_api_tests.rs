//! Integration tests for customers, contracts, packages and rate limiting

mod helpers;

use axum::http::StatusCode;
use helpers::{id_of, json_request, TestApp};
use logiflow_server::rate_limit::GovernorRateLimiter;
use serde_json::json;

// =============================================================================
// Customers and contracts
// =============================================================================

#[tokio::test]
async fn test_contract_delete_falls_back_to_deactivate() {
    let app = TestApp::new().await;

    let (status, customer) = app
        .post("/api/customers", json!({ "name": "Maison Durand" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, used) = app
        .post(
            "/api/contracts",
            json!({
                "name": "Colis standard",
                "customer_id": customer["id"],
                "pricing_model": "PER_PACKAGE",
                "rate": 2.4
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", used);
    let (_, unused) = app
        .post("/api/contracts", json!({ "name": "Express", "pricing_model": "PER_KM" }))
        .await;

    let (status, _) = app
        .post("/api/packages", json!({ "description": "Vase", "contract_id": used["id"] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, outcome) = app.delete(&format!("/api/contracts/{}", id_of(&used))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "outcome": "DEACTIVATED", "dependents": 1 }));

    let (status, contract) = app.get(&format!("/api/contracts/{}", id_of(&used))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contract["is_active"], false);

    let (_, outcome) = app.delete(&format!("/api/contracts/{}", id_of(&unused))).await;
    assert_eq!(outcome, json!({ "outcome": "DELETED" }));
    let (status, _) = app.get(&format!("/api/contracts/{}", id_of(&unused))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_delete_policy() {
    let app = TestApp::new().await;
    let (_, with_contract) = app.post("/api/customers", json!({ "name": "Durand" })).await;
    let (_, alone) = app.post("/api/customers", json!({ "name": "Petit" })).await;
    app.post(
        "/api/contracts",
        json!({ "name": "Tournées", "customer_id": with_contract["id"], "pricing_model": "PER_STOP" }),
    )
    .await;

    let (_, outcome) = app.delete(&format!("/api/customers/{}", id_of(&with_contract))).await;
    assert_eq!(outcome["outcome"], "DEACTIVATED");

    let (_, outcome) = app.delete(&format!("/api/customers/{}", id_of(&alone))).await;
    assert_eq!(outcome["outcome"], "DELETED");

    let (_, customers) = app.get("/api/customers").await;
    assert_eq!(customers.as_array().unwrap().len(), 1);

    let (status, _) = app
        .delete("/api/customers/00000000-0000-4000-8000-000000000000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_contract_validation() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/api/contracts",
            json!({
                "name": "Orphan",
                "customer_id": "00000000-0000-4000-8000-000000000000",
                "pricing_model": "PER_STOP"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/contracts", json!({ "name": "Neg", "pricing_model": "PER_STOP", "rate": -1.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/customers", json!({ "name": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Packages
// =============================================================================

#[tokio::test]
async fn test_package_registration() {
    let app = TestApp::new().await;

    let (status, package) = app
        .post(
            "/api/packages",
            json!({ "description": "Lamp", "weight_kg": 2.5, "external_barcode": "EXT-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(package["status"], "PENDING");
    assert!(package["stop_id"].is_null());
    let barcode = package["barcode"].as_str().unwrap();
    assert_eq!(barcode.len(), 16);
    assert!(barcode.starts_with("PKG-"));

    let (status, fetched) = app.get(&format!("/api/packages/{}", id_of(&package))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["external_barcode"], "EXT-1");

    let (status, _) = app
        .post("/api/packages", json!({ "description": "Bad", "weight_kg": -3.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = app.get("/api/packages").await;
    assert_eq!(page["total"], 1);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_mutations_rate_limited_per_actor() {
    let app = TestApp::with_limiter(GovernorRateLimiter::new(1, 2)).await;

    let create = |actor: &str| {
        let mut request = json_request("POST", "/api/customers", Some(json!({ "name": "C" })));
        request
            .headers_mut()
            .insert("x-actor-id", actor.parse().unwrap());
        request
    };

    let first = app.send(create("driver-1")).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert!(first.headers().contains_key("x-ratelimit-remaining"));

    let second = app.send(create("driver-1")).await;
    assert_eq!(second.status(), StatusCode::CREATED);
    assert!(second.headers().contains_key("x-ratelimit-remaining"));

    let third = app.send(create("driver-1")).await;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(third.headers().contains_key("retry-after"));
    assert_eq!(third.headers()["x-ratelimit-remaining"], "0");
    let body = helpers::extract_json(third.into_body()).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // another actor has its own quota
    let other = app.send(create("driver-2")).await;
    assert_eq!(other.status(), StatusCode::CREATED);

    // reads and health are never limited
    let (status, _) = app.get("/api/customers").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}
