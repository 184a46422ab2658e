//! Package endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use logiflow_common::models::Package;
use logiflow_common::time::now;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::actor::Actor;
use crate::db::{contracts, packages};
use crate::db::packages::NewPackage;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::pagination::{calculate_pagination, Page, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PackageListQuery {
    /// Only packages not yet placed on a stop
    #[serde(default)]
    pub unassigned: bool,
    pub page: Option<i64>,
}

/// GET /api/packages
pub async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<PackageListQuery>,
) -> ApiResult<Json<Page<Package>>> {
    let mut conn = state.db.acquire().await?;
    let total = packages::count_packages(&mut conn, query.unassigned).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let items = packages::list_packages(&mut conn, query.unassigned, pagination.offset, PAGE_SIZE).await?;

    Ok(Json(Page::new(items, pagination, total)))
}

/// POST /api/packages
///
/// Registers an unassigned package; it joins a route through
/// `/api/routes/from-packages`.
pub async fn create_package(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<NewPackage>,
) -> ApiResult<(StatusCode, Json<Package>)> {
    let mut conn = state.db.acquire().await?;
    contracts::ensure_contract_exists(&mut conn, input.contract_id).await?;

    let package = input.into_package(None, &actor, now())?;
    packages::insert_package(&mut conn, &package).await?;

    info!(package_id = %package.id, barcode = %package.barcode, "Registered package");
    Ok((StatusCode::CREATED, Json(package)))
}

/// GET /api/packages/:id
pub async fn get_package(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Package>> {
    let mut conn = state.db.acquire().await?;
    let package = packages::require_package(&mut conn, id).await?;
    Ok(Json(package))
}

pub fn package_routes() -> Router<AppState> {
    Router::new()
        .route("/api/packages", get(list_packages).post(create_package))
        .route("/api/packages/:id", get(get_package))
}
