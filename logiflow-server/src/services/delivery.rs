//! Delivery actions on a stop
//!
//! Stop update, package cascade and counter recomputation commit together
//! or not at all.

use logiflow_common::lifecycle::{plan_stop_transition, StopUpdate};
use logiflow_common::models::StopDetail;
use logiflow_common::time::now;
use logiflow_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::{aggregates, packages, routes, stops};

fn capture_position(update: &StopUpdate) -> Result<Option<(f64, f64)>> {
    match (update.latitude, update.longitude) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(Error::InvalidInput(format!("Invalid coordinates: {}, {}", lat, lng)));
            }
            Ok(Some((lat, lng)))
        }
        _ => Err(Error::InvalidInput(
            "latitude and longitude must be sent together".to_string(),
        )),
    }
}

/// Apply a delivery action to a stop and return it with its packages
pub async fn record_delivery_action(pool: &SqlitePool, stop_id: Uuid, update: &StopUpdate) -> Result<StopDetail> {
    let position = capture_position(update)?;

    let mut tx = pool.begin().await?;

    let stop = stops::require_stop(&mut tx, stop_id).await?;
    let route = routes::require_route(&mut tx, stop.route_id).await?;
    let transition = plan_stop_transition(route.status, stop.status, update)?;

    let now = now();
    stops::apply_transition(&mut tx, stop_id, &transition, position, now).await?;
    let cascaded = packages::cascade_transition(&mut tx, stop_id, &transition, now).await?;
    aggregates::recalculate_route(&mut tx, route.id).await?;

    let stop = stops::require_stop(&mut tx, stop_id).await?;
    let stop_packages = packages::list_for_stop(&mut tx, stop_id).await?;
    tx.commit().await?;

    info!(
        route_id = %route.id,
        stop_id = %stop_id,
        stop_number = stop.stop_number,
        status = %stop.status,
        packages = cascaded,
        "Delivery action recorded"
    );

    Ok(StopDetail {
        stop,
        packages: stop_packages,
    })
}
