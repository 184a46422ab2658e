//! Integration tests for delivery actions on stops
//!
//! A delivery action updates the stop, cascades to its packages and
//! refreshes the route counters in one commit, or changes nothing.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{extract_json, id_of, TestApp};
use serde_json::{json, Value};

/// Started route with one stop per entry of `packages_per_stop`
async fn started_route(app: &TestApp, packages_per_stop: &[usize]) -> (String, Vec<Value>) {
    let route_id = id_of(&app.create_route(json!({})).await);
    let mut stops = Vec::new();
    for (i, count) in packages_per_stop.iter().enumerate() {
        stops.push(app.add_stop(&route_id, &format!("{} Rue Lepic", i + 1), *count).await);
    }
    let (status, _) = app.post(&format!("/api/routes/{}/start", route_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    (route_id, stops)
}

async fn stop_status(app: &TestApp, route_id: &str, index: usize) -> Value {
    app.route(route_id).await["stops"][index]["status"].clone()
}

#[tokio::test]
async fn test_complete_cascades_proof_to_packages() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[3]).await;
    let stop_id = id_of(&stops[0]);

    let (status, stop) = app
        .patch(
            &format!("/api/stops/{}", stop_id),
            json!({
                "status": "COMPLETED",
                "signature": "data:image/png;base64,AAAA",
                "signed_by": "J. Martin",
                "delivery_notes": "Left with concierge",
                "proof_photo": "photos/door.jpg",
                "latitude": 48.884,
                "longitude": 2.333
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", stop);
    assert_eq!(stop["status"], "COMPLETED");
    assert_eq!(stop["signed_by"], "J. Martin");
    assert!(stop["actual_arrival"].is_string());
    assert!(stop["departure_time"].is_string());
    assert_eq!(stop["delivery_latitude"], 48.884);
    assert_eq!(stop["delivery_longitude"], 2.333);

    let packages = stop["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 3);
    for package in packages {
        assert_eq!(package["status"], "DELIVERED");
        assert_eq!(package["signature"], stop["signature"]);
        assert_eq!(package["signed_by"], "J. Martin");
        assert_eq!(package["proof_photo"], "photos/door.jpg");
        assert_eq!(package["delivery_notes"], "Left with concierge");
        assert!(package["delivered_at"].is_string());
    }

    let route = app.route(&route_id).await;
    assert_eq!(route["completed_stops"], 1);
    assert_eq!(route["delivered_packages"], 3);
}

#[tokio::test]
async fn test_completion_requires_signature_and_signer() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;
    let uri = format!("/api/stops/{}", id_of(&stops[0]));

    let (status, body) = app
        .patch(&uri, json!({ "status": "COMPLETED", "signed_by": "J. Martin" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = app
        .patch(&uri, json!({ "status": "COMPLETED", "signature": "sig", "signed_by": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(stop_status(&app, &route_id, 0).await, "PENDING");
    assert_eq!(app.route(&route_id).await["delivered_packages"], 0);
}

#[tokio::test]
async fn test_failure_requires_reason() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;
    let uri = format!("/api/stops/{}", id_of(&stops[0]));

    let (status, _) = app.patch(&uri, json!({ "status": "FAILED" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, json!({ "status": "FAILED", "failure_reason": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, json!({ "status": "FAILED", "failure_reason": "ALIENS" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(stop_status(&app, &route_id, 0).await, "PENDING");
}

#[tokio::test]
async fn test_failure_cascades_reason_to_packages() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[2]).await;

    let (status, stop) = app
        .patch(
            &format!("/api/stops/{}", id_of(&stops[0])),
            json!({
                "status": "FAILED",
                "failure_reason": "ABSENT_RECIPIENT",
                "failure_detail": "Nobody at 3rd floor"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", stop);
    assert_eq!(stop["status"], "FAILED");
    let reason = stop["failure_reason"].as_str().unwrap();
    assert!(reason.starts_with("Recipient absent"));
    assert!(reason.contains("Nobody at 3rd floor"));

    for package in stop["packages"].as_array().unwrap() {
        assert_eq!(package["status"], "FAILED");
        assert_eq!(package["delivery_notes"], reason);
    }

    let route = app.route(&route_id).await;
    assert_eq!(route["completed_stops"], 0);
    assert_eq!(route["delivered_packages"], 0);
}

#[tokio::test]
async fn test_arrival_then_completion() {
    let app = TestApp::new().await;
    let (_, stops) = started_route(&app, &[1]).await;
    let uri = format!("/api/stops/{}", id_of(&stops[0]));

    let (status, stop) = app.patch(&uri, json!({ "status": "IN_PROGRESS" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stop["status"], "IN_PROGRESS");
    assert!(stop["actual_arrival"].is_null());

    let (status, stop) = app.patch(&uri, json!({ "status": "ARRIVED" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(stop["actual_arrival"].is_string());

    // cannot step back
    let (status, _) = app.patch(&uri, json!({ "status": "IN_PROGRESS" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stop) = app
        .patch(&uri, json!({ "status": "COMPLETED", "signature": "s", "signed_by": "Concierge" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stop["status"], "COMPLETED");
    // completion restamps arrival with the departure time
    assert!(stop["departure_time"].is_string());
    assert_eq!(stop["actual_arrival"], stop["departure_time"]);
}

#[tokio::test]
async fn test_terminal_stop_is_frozen() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;
    let uri = format!("/api/stops/{}", id_of(&stops[0]));

    let (status, _) = app
        .patch(&uri, json!({ "status": "COMPLETED", "signature": "s", "signed_by": "Anne" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(&uri, json!({ "status": "FAILED", "failure_reason": "REFUSED" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let route = app.route(&route_id).await;
    assert_eq!(route["stops"][0]["status"], "COMPLETED");
    assert_eq!(route["delivered_packages"], 1);
}

#[tokio::test]
async fn test_skip_leaves_packages_untouched() {
    let app = TestApp::new().await;
    let (_, stops) = started_route(&app, &[2]).await;

    let (status, stop) = app
        .patch(
            &format!("/api/stops/{}", id_of(&stops[0])),
            json!({ "status": "SKIPPED", "delivery_notes": "Road closed" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stop["status"], "SKIPPED");
    assert_eq!(stop["delivery_notes"], "Road closed");
    for package in stop["packages"].as_array().unwrap() {
        assert_eq!(package["status"], "OUT_FOR_DELIVERY");
    }
}

#[tokio::test]
async fn test_cancelled_route_rejects_delivery_actions() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;

    let (status, _) = app.post(&format!("/api/routes/{}/cancel", route_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(
            &format!("/api/stops/{}", id_of(&stops[0])),
            json!({ "status": "COMPLETED", "signature": "s", "signed_by": "Anne" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
    assert_eq!(stop_status(&app, &route_id, 0).await, "PENDING");
}

#[tokio::test]
async fn test_half_gps_position_rejected() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;

    let (status, _) = app
        .patch(
            &format!("/api/stops/{}", id_of(&stops[0])),
            json!({ "status": "ARRIVED", "latitude": 48.8 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stop_status(&app, &route_id, 0).await, "PENDING");
}

#[tokio::test]
async fn test_counters_track_every_action() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1, 2, 3]).await;

    app.patch(
        &format!("/api/stops/{}", id_of(&stops[0])),
        json!({ "status": "COMPLETED", "signature": "s", "signed_by": "A" }),
    )
    .await;
    app.patch(
        &format!("/api/stops/{}", id_of(&stops[1])),
        json!({ "status": "FAILED", "failure_reason": "ACCESS_DENIED" }),
    )
    .await;
    app.patch(
        &format!("/api/stops/{}", id_of(&stops[2])),
        json!({ "status": "COMPLETED", "signature": "s", "signed_by": "C" }),
    )
    .await;

    let route = app.route(&route_id).await;
    assert_eq!(route["total_stops"], 3);
    assert_eq!(route["completed_stops"], 2);
    assert_eq!(route["total_packages"], 6);
    assert_eq!(route["delivered_packages"], 4);

    let delivered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE status = 'DELIVERED'")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(delivered, 4);
}

#[tokio::test]
async fn test_unreadable_body_uses_error_envelope() {
    let app = TestApp::new().await;
    let (route_id, stops) = started_route(&app, &[1]).await;
    let uri = format!("/api/stops/{}", id_of(&stops[0]));

    // not a stop status
    let (status, body) = app.patch(&uri, json!({ "status": "DELIVERED" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].is_string());

    // malformed JSON
    let request = Request::builder()
        .method("PATCH")
        .uri(&uri)
        .header("content-type", "application/json")
        .body(Body::from("{\"status\":"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    assert_eq!(stop_status(&app, &route_id, 0).await, "PENDING");
}
