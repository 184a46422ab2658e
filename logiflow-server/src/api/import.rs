//! Bulk import endpoint

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use crate::actor::Actor;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::services::route_builder::{self, ImportRequest, ImportSummary};
use crate::AppState;

/// POST /api/import
///
/// Rows arrive already tokenized as header → cell maps.
pub async fn import_rows(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportSummary>)> {
    let summary = route_builder::import_rows(&state.db, request, &actor).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub fn import_routes() -> Router<AppState> {
    Router::new().route("/api/import", post(import_rows))
}
