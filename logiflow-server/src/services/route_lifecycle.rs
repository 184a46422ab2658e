//! Route status changes, header edits and deletion

use chrono::NaiveDate;
use logiflow_common::lifecycle::{check_route_transition, ensure_structure_editable};
use logiflow_common::models::{Route, RouteCounters, RouteStatus};
use logiflow_common::time::now;
use logiflow_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::{aggregates, contracts, packages, routes, stops};

/// Move a route to `target`
///
/// Starting stamps `started_at` and sends the route's depot packages out
/// for delivery; completing stamps `completed_at`.
pub async fn transition_route(pool: &SqlitePool, id: Uuid, target: RouteStatus) -> Result<Route> {
    let mut tx = pool.begin().await?;

    let route = routes::require_route(&mut tx, id).await?;
    check_route_transition(route.status, target)?;

    let now = now();
    let started_at = (target == RouteStatus::InProgress).then_some(now);
    let completed_at = (target == RouteStatus::Completed).then_some(now);
    routes::update_status(&mut tx, id, target, started_at, completed_at, now).await?;

    if target == RouteStatus::InProgress {
        let dispatched = packages::mark_out_for_delivery(&mut tx, id, now).await?;
        info!(route_id = %id, packages = dispatched, "Packages out for delivery");
    }

    let updated = routes::require_route(&mut tx, id).await?;
    tx.commit().await?;

    info!(
        route_id = %id,
        route_number = %updated.route_number,
        from = %route.status,
        to = %target,
        "Route status changed"
    );

    Ok(updated)
}

/// Editable route header; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteHeaderUpdate {
    pub name: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub contract_id: Option<Uuid>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub total_distance_km: Option<f64>,
}

/// Update a Draft route's header
///
/// The route number keeps the date it was issued for.
pub async fn update_route_header(pool: &SqlitePool, id: Uuid, changes: RouteHeaderUpdate) -> Result<Route> {
    let mut tx = pool.begin().await?;

    let mut route = routes::require_route(&mut tx, id).await?;
    ensure_structure_editable(route.status)?;
    contracts::ensure_contract_exists(&mut tx, changes.contract_id).await?;

    if let Some(distance) = changes.total_distance_km {
        if !distance.is_finite() || distance < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid distance: {}", distance)));
        }
    }

    route.name = changes.name.or(route.name);
    route.scheduled_date = changes.scheduled_date.unwrap_or(route.scheduled_date);
    route.notes = changes.notes.or(route.notes);
    route.contract_id = changes.contract_id.or(route.contract_id);
    route.driver_id = changes.driver_id.or(route.driver_id);
    route.vehicle_id = changes.vehicle_id.or(route.vehicle_id);
    route.total_distance_km = changes.total_distance_km.or(route.total_distance_km);
    route.updated_at = now();

    routes::update_header(&mut tx, &route).await?;
    tx.commit().await?;

    info!(route_id = %id, "Route header updated");
    Ok(route)
}

/// Delete a Draft route with its stops and their packages
pub async fn delete_route(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let route = routes::require_route(&mut tx, id).await?;
    ensure_structure_editable(route.status)?;

    let removed_packages = packages::delete_for_route(&mut tx, id).await?;
    let removed_stops = stops::delete_for_route(&mut tx, id).await?;
    routes::delete_route(&mut tx, id).await?;

    tx.commit().await?;

    info!(
        route_id = %id,
        route_number = %route.route_number,
        stops = removed_stops,
        packages = removed_packages,
        "Deleted route"
    );
    Ok(())
}

/// Recompute a route's counters on demand
pub async fn recalculate(pool: &SqlitePool, id: Uuid) -> Result<RouteCounters> {
    let mut tx = pool.begin().await?;
    routes::require_route(&mut tx, id).await?;
    let counters = aggregates::recalculate_route(&mut tx, id).await?;
    tx.commit().await?;
    Ok(counters)
}
