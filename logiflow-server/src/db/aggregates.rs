//! Route counter recalculation
//!
//! The four counters on a route are a cache over its stops and packages.
//! They are always recomputed from the live rows and overwritten as a
//! whole, inside the caller's transaction. A route whose counters already
//! match is left untouched, `updated_at` included.

use logiflow_common::models::{PackageStatus, RouteCounters, StopStatus};
use logiflow_common::time::{format_timestamp, now};
use logiflow_common::Result;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

/// Recompute and persist the counters of one route
pub async fn recalculate_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<RouteCounters> {
    let id = route_id.to_string();

    let stop_row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_stops,
               COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) AS completed_stops
        FROM route_stops
        WHERE route_id = ?
        "#,
    )
    .bind(StopStatus::Completed.as_str())
    .bind(&id)
    .fetch_one(&mut *conn)
    .await?;

    let package_row = sqlx::query(
        r#"
        SELECT COUNT(p.id) AS total_packages,
               COALESCE(SUM(CASE WHEN p.status = ? THEN 1 ELSE 0 END), 0) AS delivered_packages
        FROM packages p
        JOIN route_stops s ON s.id = p.stop_id
        WHERE s.route_id = ?
        "#,
    )
    .bind(PackageStatus::Delivered.as_str())
    .bind(&id)
    .fetch_one(&mut *conn)
    .await?;

    let counters = RouteCounters {
        total_stops: stop_row.get("total_stops"),
        completed_stops: stop_row.get("completed_stops"),
        total_packages: package_row.get("total_packages"),
        delivered_packages: package_row.get("delivered_packages"),
    };

    sqlx::query(
        r#"
        UPDATE routes
        SET total_stops = ?, completed_stops = ?, total_packages = ?, delivered_packages = ?,
            updated_at = ?
        WHERE id = ?
          AND NOT (total_stops = ? AND completed_stops = ? AND total_packages = ?
                   AND delivered_packages = ?)
        "#,
    )
    .bind(counters.total_stops)
    .bind(counters.completed_stops)
    .bind(counters.total_packages)
    .bind(counters.delivered_packages)
    .bind(format_timestamp(&now()))
    .bind(&id)
    .bind(counters.total_stops)
    .bind(counters.completed_stops)
    .bind(counters.total_packages)
    .bind(counters.delivered_packages)
    .execute(&mut *conn)
    .await?;

    debug!(
        route_id = %route_id,
        total_stops = counters.total_stops,
        completed_stops = counters.completed_stops,
        total_packages = counters.total_packages,
        delivered_packages = counters.delivered_packages,
        "Route counters recalculated"
    );

    Ok(counters)
}
