//! Stop endpoints: delivery actions and deletion

use axum::{
    extract::{Path, State},
    routing::patch,
    Json, Router,
};
use logiflow_common::lifecycle::StopUpdate;
use logiflow_common::models::{RouteCounters, StopDetail};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::services::{delivery, stop_editor};
use crate::AppState;

/// PATCH /api/stops/:id
///
/// Status change with its proof, failure reason or GPS evidence. The
/// stop's packages and the route's counters follow in the same commit.
pub async fn update_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<Uuid>,
    ApiJson(update): ApiJson<StopUpdate>,
) -> ApiResult<Json<StopDetail>> {
    let detail = delivery::record_delivery_action(&state.db, stop_id, &update).await?;
    Ok(Json(detail))
}

#[derive(Debug, Serialize)]
pub struct DeleteStopResponse {
    pub deleted: Uuid,
    pub route_id: Uuid,
    #[serde(flatten)]
    pub counters: RouteCounters,
}

/// DELETE /api/stops/:id
pub async fn delete_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<Uuid>,
) -> ApiResult<Json<DeleteStopResponse>> {
    let (route_id, counters) = stop_editor::delete_stop(&state.db, stop_id).await?;
    Ok(Json(DeleteStopResponse {
        deleted: stop_id,
        route_id,
        counters,
    }))
}

pub fn stop_routes() -> Router<AppState> {
    Router::new().route("/api/stops/:id", patch(update_stop).delete(delete_stop))
}
