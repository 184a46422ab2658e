//! Turn-by-turn link for the stops a driver still has to visit

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use logiflow_common::maps::{build_navigation_url, Coordinates, NavigationStop};
use logiflow_common::models::StopStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{routes, stops};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NavigationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub url: String,
    pub truncated: bool,
    pub waypoint_count: usize,
    /// Remaining stops the link was built from
    pub stop_count: usize,
}

fn current_position(query: &NavigationQuery) -> Result<Option<Coordinates>, ApiError> {
    match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(ApiError::BadRequest(format!("Invalid coordinates: {}, {}", lat, lng)));
            }
            Ok(Some(Coordinates { lat, lng }))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::BadRequest("lat and lng must be sent together".to_string())),
    }
}

/// GET /api/routes/:id/navigation
pub async fn route_navigation(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Query(query): Query<NavigationQuery>,
) -> ApiResult<Json<NavigationResponse>> {
    let current = current_position(&query)?;

    let mut conn = state.db.acquire().await?;
    routes::require_route(&mut conn, route_id).await?;

    let remaining: Vec<NavigationStop> = stops::list_for_route(&mut conn, route_id)
        .await?
        .into_iter()
        .filter(|s| {
            matches!(
                s.status,
                StopStatus::Pending | StopStatus::InProgress | StopStatus::Arrived
            )
        })
        .map(|s| NavigationStop::new(s.address, s.city, s.postal_code))
        .collect();

    let link = build_navigation_url(&remaining, current)
        .ok_or_else(|| ApiError::BadRequest("Route has no remaining stops".to_string()))?;

    Ok(Json(NavigationResponse {
        url: link.url,
        truncated: link.truncated,
        waypoint_count: link.waypoint_count,
        stop_count: remaining.len(),
    }))
}

pub fn navigation_routes() -> Router<AppState> {
    Router::new().route("/api/routes/:id/navigation", get(route_navigation))
}
