//! Structural edits to a Draft route's stops

use logiflow_common::lifecycle::ensure_structure_editable;
use logiflow_common::models::{RouteCounters, RouteStop, StopDetail, StopStatus};
use logiflow_common::time::now;
use logiflow_common::uuid_utils;
use logiflow_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::db::packages::NewPackage;
use crate::db::{aggregates, contracts, packages, routes, stops};

/// Manually entered stop, optionally with its packages
#[derive(Debug, Clone, Deserialize)]
pub struct NewStop {
    pub recipient_name: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub access_code: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub packages: Vec<NewPackage>,
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Append a stop to a Draft route
pub async fn add_stop(pool: &SqlitePool, route_id: Uuid, input: NewStop, created_by: &str) -> Result<StopDetail> {
    let address = required(&input.address, "address")?;
    let city = required(&input.city, "city")?;
    let postal_code = required(&input.postal_code, "postal_code")?;

    let mut tx = pool.begin().await?;

    let route = routes::require_route(&mut tx, route_id).await?;
    ensure_structure_editable(route.status)?;

    let now = now();
    let stop_number = stops::count_for_route(&mut tx, route_id).await? + 1;
    let stop = RouteStop {
        id: uuid_utils::generate(),
        route_id,
        stop_number,
        status: StopStatus::Pending,
        recipient_name: input.recipient_name,
        address,
        city,
        postal_code,
        phone: input.phone,
        latitude: input.latitude,
        longitude: input.longitude,
        access_code: input.access_code,
        instructions: input.instructions,
        signature: None,
        signed_by: None,
        proof_photo: None,
        delivery_notes: None,
        failure_reason: None,
        actual_arrival: None,
        departure_time: None,
        delivery_latitude: None,
        delivery_longitude: None,
        created_at: now,
        updated_at: now,
    };
    stops::insert_stop(&mut tx, &stop).await?;

    let mut stop_packages = Vec::with_capacity(input.packages.len());
    for mut new_package in input.packages {
        contracts::ensure_contract_exists(&mut tx, new_package.contract_id).await?;
        // inline packages default to the stop's destination
        new_package.recipient_name = new_package.recipient_name.or_else(|| stop.recipient_name.clone());
        new_package.address = new_package.address.or_else(|| Some(stop.address.clone()));
        new_package.city = new_package.city.or_else(|| Some(stop.city.clone()));
        new_package.postal_code = new_package.postal_code.or_else(|| Some(stop.postal_code.clone()));
        new_package.access_code = new_package.access_code.or_else(|| stop.access_code.clone());

        let package = new_package.into_package(Some(stop.id), created_by, now)?;
        packages::insert_package(&mut tx, &package).await?;
        stop_packages.push(package);
    }

    aggregates::recalculate_route(&mut tx, route_id).await?;
    tx.commit().await?;

    info!(
        route_id = %route_id,
        stop_id = %stop.id,
        stop_number,
        packages = stop_packages.len(),
        "Added stop"
    );

    Ok(StopDetail {
        stop,
        packages: stop_packages,
    })
}

/// Delete a stop and its packages from a Draft route, closing the gap
pub async fn delete_stop(pool: &SqlitePool, stop_id: Uuid) -> Result<(Uuid, RouteCounters)> {
    let mut tx = pool.begin().await?;

    let stop = stops::require_stop(&mut tx, stop_id).await?;
    let route = routes::require_route(&mut tx, stop.route_id).await?;
    ensure_structure_editable(route.status)?;

    let now = now();
    let removed_packages = packages::delete_for_stop(&mut tx, stop_id).await?;
    stops::delete_stop(&mut tx, stop_id).await?;
    stops::renumber(&mut tx, route.id, now).await?;
    let counters = aggregates::recalculate_route(&mut tx, route.id).await?;

    tx.commit().await?;

    info!(
        route_id = %route.id,
        stop_id = %stop_id,
        stop_number = stop.stop_number,
        packages = removed_packages,
        "Deleted stop"
    );

    Ok((route.id, counters))
}

/// Resequence a Draft route's stops to match `ordered`
///
/// `ordered` must name every stop of the route exactly once.
pub async fn reorder_stops(pool: &SqlitePool, route_id: Uuid, ordered: &[Uuid]) -> Result<Vec<RouteStop>> {
    let mut tx = pool.begin().await?;

    let route = routes::require_route(&mut tx, route_id).await?;
    ensure_structure_editable(route.status)?;

    let current: HashSet<Uuid> = stops::list_for_route(&mut tx, route_id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let requested: HashSet<Uuid> = ordered.iter().copied().collect();

    if requested.len() != ordered.len() {
        return Err(Error::InvalidInput("Stop order lists a stop twice".to_string()));
    }
    if requested != current {
        return Err(Error::InvalidInput(format!(
            "Stop order must list each of the route's {} stops exactly once",
            current.len()
        )));
    }

    stops::set_order(&mut tx, route_id, ordered, now()).await?;
    let reordered = stops::list_for_route(&mut tx, route_id).await?;
    tx.commit().await?;

    info!(route_id = %route_id, stops = reordered.len(), "Reordered stops");
    Ok(reordered)
}
