//! Route construction
//!
//! Three ways to get a Draft route with stops: an empty route, a route
//! grouped from already-registered packages, and a bulk import of
//! spreadsheet rows. Each runs in a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use logiflow_common::grouping::{group_by_address, GroupKey, Grouping, StopDraft};
use logiflow_common::import::{parse_rows, ImportRow, RawRow};
use logiflow_common::lifecycle::ensure_structure_editable;
use logiflow_common::models::{Route, RouteCounters, RouteStatus, RouteStop, StopStatus};
use logiflow_common::time::{now, today};
use logiflow_common::uuid_utils;
use logiflow_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::db::{aggregates, contracts, packages, routes, stops};
use crate::db::packages::NewPackage;

/// Route header supplied on creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRoute {
    pub name: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub contract_id: Option<Uuid>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub notes: Option<String>,
}

/// Insert an empty Draft route numbered for its scheduled date
pub(crate) async fn insert_draft_route(
    conn: &mut SqliteConnection,
    input: &NewRoute,
    created_by: &str,
    now: DateTime<Utc>,
) -> Result<Route> {
    contracts::ensure_contract_exists(conn, input.contract_id).await?;

    let scheduled_date = input.scheduled_date.unwrap_or_else(today);
    let route_number = routes::next_route_number(conn, &scheduled_date).await?;

    let route = Route {
        id: uuid_utils::generate(),
        route_number,
        name: input.name.clone(),
        status: RouteStatus::Draft,
        scheduled_date,
        started_at: None,
        completed_at: None,
        counters: RouteCounters::default(),
        total_distance_km: None,
        notes: input.notes.clone(),
        contract_id: input.contract_id,
        driver_id: input.driver_id.clone(),
        vehicle_id: input.vehicle_id.clone(),
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    };

    routes::insert_route(conn, &route).await?;
    Ok(route)
}

/// Create an empty Draft route
pub async fn create_route(pool: &SqlitePool, input: &NewRoute, created_by: &str) -> Result<Route> {
    let mut tx = pool.begin().await?;
    let route = insert_draft_route(&mut tx, input, created_by, now()).await?;
    tx.commit().await?;

    info!(route_id = %route.id, route_number = %route.route_number, "Created route");
    Ok(route)
}

fn stop_from_draft<T>(draft: &StopDraft<T>, route_id: Uuid, now: DateTime<Utc>) -> RouteStop {
    RouteStop {
        id: uuid_utils::generate(),
        route_id,
        stop_number: draft.stop_number,
        status: StopStatus::Pending,
        recipient_name: draft.recipient_name.clone(),
        address: draft.address.clone(),
        city: draft.city.clone(),
        postal_code: draft.postal_code.clone(),
        phone: draft.phone.clone(),
        latitude: None,
        longitude: None,
        access_code: draft.access_code.clone(),
        instructions: draft.instructions.clone(),
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
    }
}

// ============================================================================
// From a package selection
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RouteFromPackages {
    pub package_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub route: NewRoute,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteFromPackagesResult {
    pub route: Route,
    pub stops_created: usize,
    pub packages_assigned: usize,
    /// Selected packages left unassigned for lack of a full address
    pub packages_skipped: usize,
}

/// Group unassigned packages by street and postal code into a new route
pub async fn create_route_from_packages(
    pool: &SqlitePool,
    request: &RouteFromPackages,
    created_by: &str,
) -> Result<RouteFromPackagesResult> {
    if request.package_ids.is_empty() {
        return Err(Error::InvalidInput("No packages selected".to_string()));
    }

    let mut tx = pool.begin().await?;
    let now = now();

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(request.package_ids.len());
    for id in &request.package_ids {
        if !seen.insert(*id) {
            continue;
        }
        let package = packages::require_package(&mut tx, *id).await?;
        if package.stop_id.is_some() {
            return Err(Error::Conflict(format!(
                "Package {} is already assigned to a route",
                package.barcode
            )));
        }
        selected.push(package);
    }

    let grouping = group_by_address(selected, GroupKey::StreetPostalCode, 0);
    if grouping.stops.is_empty() {
        return Err(Error::InvalidInput(
            "None of the selected packages has a complete delivery address".to_string(),
        ));
    }

    let route = insert_draft_route(&mut tx, &request.route, created_by, now).await?;

    for draft in &grouping.stops {
        let stop = stop_from_draft(draft, route.id, now);
        stops::insert_stop(&mut tx, &stop).await?;
        for package in &draft.items {
            packages::assign_to_stop(&mut tx, package.id, stop.id, now).await?;
        }
    }

    let counters = aggregates::recalculate_route(&mut tx, route.id).await?;
    let route = routes::require_route(&mut tx, route.id).await?;
    tx.commit().await?;

    info!(
        route_id = %route.id,
        route_number = %route.route_number,
        stops = counters.total_stops,
        packages = counters.total_packages,
        skipped = grouping.skipped.len(),
        "Created route from packages"
    );

    Ok(RouteFromPackagesResult {
        route,
        stops_created: grouping.stops.len(),
        packages_assigned: grouping.item_count(),
        packages_skipped: grouping.skipped.len(),
    })
}

// ============================================================================
// Bulk import
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<RawRow>,
    /// Append to this Draft route instead of creating one
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub route: NewRoute,
    /// Contract every imported package is billed under
    pub contract_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub route_id: Uuid,
    pub route_number: String,
    pub stops_created: usize,
    pub packages_created: usize,
    pub rows_skipped: usize,
}

fn package_from_row(row: ImportRow, contract_id: Option<Uuid>) -> NewPackage {
    NewPackage {
        description: row.description,
        weight_kg: row.weight_kg,
        external_barcode: row.barcode,
        contract_id,
        order_ref: None,
        recipient_name: row.recipient_name,
        address: row.address,
        city: row.city,
        postal_code: row.postal_code,
        phone: row.phone,
        access_code: row.access_code,
        instructions: row.instructions,
    }
}

/// Import tokenized rows as stops and packages, all or nothing
pub async fn import_rows(pool: &SqlitePool, request: ImportRequest, created_by: &str) -> Result<ImportSummary> {
    let rows = parse_rows(&request.rows)?;

    let mut tx = pool.begin().await?;
    let now = now();

    contracts::ensure_contract_exists(&mut tx, request.contract_id).await?;

    let (route, existing_stops) = match request.route_id {
        Some(route_id) => {
            let route = routes::require_route(&mut tx, route_id).await?;
            ensure_structure_editable(route.status)?;
            let existing = stops::count_for_route(&mut tx, route_id).await?;
            (route, existing)
        }
        None => (insert_draft_route(&mut tx, &request.route, created_by, now).await?, 0),
    };

    let grouping: Grouping<ImportRow> = group_by_address(rows, GroupKey::StreetPostalCodeCity, existing_stops);
    if grouping.stops.is_empty() {
        return Err(Error::InvalidInput(
            "No row has an address, city and postal code".to_string(),
        ));
    }

    let rows_skipped = grouping.skipped.len();
    let stops_created = grouping.stops.len();
    let mut packages_created = 0;

    for draft in grouping.stops {
        let stop = stop_from_draft(&draft, route.id, now);
        stops::insert_stop(&mut tx, &stop).await?;

        for row in draft.items {
            let package = package_from_row(row, request.contract_id).into_package(Some(stop.id), created_by, now)?;
            packages::insert_package(&mut tx, &package).await?;
            packages_created += 1;
        }
    }

    aggregates::recalculate_route(&mut tx, route.id).await?;
    tx.commit().await?;

    info!(
        route_id = %route.id,
        stops_created,
        packages_created,
        rows_skipped,
        "Import complete"
    );

    Ok(ImportSummary {
        route_id: route.id,
        route_number: route.route_number,
        stops_created,
        packages_created,
        rows_skipped,
    })
}
