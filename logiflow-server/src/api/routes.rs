//! Route endpoints: creation, listing, detail, header edits and lifecycle

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use logiflow_common::models::{Route, RouteCounters, RouteDetail, RouteStatus, RouteStop, StopDetail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::Actor;
use crate::db::routes::{self as route_db, RouteFilter};
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::pagination::{calculate_pagination, Page, PAGE_SIZE};
use crate::services::route_builder::{self, NewRoute, RouteFromPackages, RouteFromPackagesResult};
use crate::services::route_lifecycle::{self, RouteHeaderUpdate};
use crate::services::stop_editor::{self, NewStop};
use crate::AppState;

/// Query parameters for the route list
#[derive(Debug, Default, Deserialize)]
pub struct RouteListQuery {
    /// Status name, e.g. `IN_PROGRESS`
    pub status: Option<String>,
    /// Scheduled date, `YYYY-MM-DD`
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
}

/// GET /api/routes
pub async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteListQuery>,
) -> ApiResult<Json<Page<Route>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.trim().to_ascii_uppercase().parse::<RouteStatus>())
        .transpose()?;
    let filter = RouteFilter {
        status,
        scheduled_date: query.date,
    };

    let mut conn = state.db.acquire().await?;
    let total = route_db::count_routes(&mut conn, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let routes = route_db::list_routes(&mut conn, &filter, pagination.offset, PAGE_SIZE).await?;

    Ok(Json(Page::new(routes, pagination, total)))
}

/// POST /api/routes
pub async fn create_route(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<NewRoute>,
) -> ApiResult<(StatusCode, Json<Route>)> {
    let route = route_builder::create_route(&state.db, &input, &actor).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

/// POST /api/routes/from-packages
pub async fn create_from_packages(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(request): ApiJson<RouteFromPackages>,
) -> ApiResult<(StatusCode, Json<RouteFromPackagesResult>)> {
    let result = route_builder::create_route_from_packages(&state.db, &request, &actor).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/routes/:id
pub async fn get_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<RouteDetail>> {
    let mut conn = state.db.acquire().await?;
    let detail = route_db::load_route_detail(&mut conn, id).await?;
    Ok(Json(detail))
}

/// PATCH /api/routes/:id
pub async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(changes): ApiJson<RouteHeaderUpdate>,
) -> ApiResult<Json<Route>> {
    let route = route_lifecycle::update_route_header(&state.db, id, changes).await?;
    Ok(Json(route))
}

/// DELETE /api/routes/:id
pub async fn delete_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    route_lifecycle::delete_route(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn transition(state: &AppState, id: Uuid, target: RouteStatus) -> ApiResult<Json<Route>> {
    let route = route_lifecycle::transition_route(&state.db, id, target).await?;
    Ok(Json(route))
}

/// POST /api/routes/:id/plan
pub async fn plan_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Route>> {
    transition(&state, id, RouteStatus::Planned).await
}

/// POST /api/routes/:id/start
pub async fn start_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Route>> {
    transition(&state, id, RouteStatus::InProgress).await
}

/// POST /api/routes/:id/complete
pub async fn complete_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Route>> {
    transition(&state, id, RouteStatus::Completed).await
}

/// POST /api/routes/:id/cancel
pub async fn cancel_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Route>> {
    transition(&state, id, RouteStatus::Cancelled).await
}

/// POST /api/routes/:id/stops
pub async fn add_stop(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<NewStop>,
) -> ApiResult<(StatusCode, Json<StopDetail>)> {
    let stop = stop_editor::add_stop(&state.db, route_id, input, &actor).await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

#[derive(Debug, Deserialize)]
pub struct StopOrderRequest {
    pub stop_ids: Vec<Uuid>,
}

/// PUT /api/routes/:id/stops/order
pub async fn reorder_stops(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    ApiJson(request): ApiJson<StopOrderRequest>,
) -> ApiResult<Json<Vec<RouteStop>>> {
    let stops = stop_editor::reorder_stops(&state.db, route_id, &request.stop_ids).await?;
    Ok(Json(stops))
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub route_id: Uuid,
    #[serde(flatten)]
    pub counters: RouteCounters,
}

/// POST /api/routes/:id/recalculate
pub async fn recalculate_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> ApiResult<Json<RecalculateResponse>> {
    let counters = route_lifecycle::recalculate(&state.db, route_id).await?;
    Ok(Json(RecalculateResponse { route_id, counters }))
}

pub fn route_routes() -> Router<AppState> {
    Router::new()
        .route("/api/routes", get(list_routes).post(create_route))
        .route("/api/routes/from-packages", post(create_from_packages))
        .route(
            "/api/routes/:id",
            get(get_route).patch(update_route).delete(delete_route),
        )
        .route("/api/routes/:id/plan", post(plan_route))
        .route("/api/routes/:id/start", post(start_route))
        .route("/api/routes/:id/complete", post(complete_route))
        .route("/api/routes/:id/cancel", post(cancel_route))
        .route("/api/routes/:id/stops", post(add_stop))
        .route("/api/routes/:id/stops/order", put(reorder_stops))
        .route("/api/routes/:id/recalculate", post(recalculate_route))
}
