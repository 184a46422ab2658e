//! Route persistence

use chrono::{DateTime, NaiveDate, Utc};
use logiflow_common::models::{Route, RouteCounters, RouteDetail, RouteStatus, StopDetail};
use logiflow_common::time::{compact_date, format_timestamp, parse_date, parse_optional_timestamp, parse_timestamp};
use logiflow_common::uuid_utils::{parse_column, parse_optional_column};
use logiflow_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use uuid::Uuid;

use super::{packages, stops};

const ROUTE_COLUMNS: &str = "id, route_number, name, status, scheduled_date, started_at, completed_at, \
     total_stops, completed_stops, total_packages, delivered_packages, total_distance_km, notes, \
     contract_id, driver_id, vehicle_id, created_by, created_at, updated_at";

fn route_from_row(row: &SqliteRow) -> Result<Route> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let scheduled_date: String = row.get("scheduled_date");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Route {
        id: parse_column(&id)?,
        route_number: row.get("route_number"),
        name: row.get("name"),
        status: status.parse()?,
        scheduled_date: parse_date(&scheduled_date)?,
        started_at: parse_optional_timestamp(row.get("started_at"))?,
        completed_at: parse_optional_timestamp(row.get("completed_at"))?,
        counters: RouteCounters {
            total_stops: row.get("total_stops"),
            completed_stops: row.get("completed_stops"),
            total_packages: row.get("total_packages"),
            delivered_packages: row.get("delivered_packages"),
        },
        total_distance_km: row.get("total_distance_km"),
        notes: row.get("notes"),
        contract_id: parse_optional_column(row.get("contract_id"))?,
        driver_id: row.get("driver_id"),
        vehicle_id: row.get("vehicle_id"),
        created_by: row.get("created_by"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Next free `RT-YYYYMMDD-NNN` for the scheduled date
///
/// Must be called inside the transaction that inserts the route.
pub async fn next_route_number(conn: &mut SqliteConnection, date: &NaiveDate) -> Result<String> {
    let prefix = format!("RT-{}-", compact_date(date));

    let highest: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(CAST(substr(route_number, ?) AS INTEGER)) FROM routes WHERE route_number LIKE ?",
    )
    .bind(prefix.len() as i64 + 1)
    .bind(format!("{}%", prefix))
    .fetch_one(&mut *conn)
    .await?;

    Ok(format!("{}{:03}", prefix, highest.unwrap_or(0) + 1))
}

pub async fn insert_route(conn: &mut SqliteConnection, route: &Route) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO routes (
            id, route_number, name, status, scheduled_date, started_at, completed_at,
            total_stops, completed_stops, total_packages, delivered_packages,
            total_distance_km, notes, contract_id, driver_id, vehicle_id,
            created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(route.id.to_string())
    .bind(&route.route_number)
    .bind(&route.name)
    .bind(route.status.as_str())
    .bind(route.scheduled_date.to_string())
    .bind(route.started_at.as_ref().map(format_timestamp))
    .bind(route.completed_at.as_ref().map(format_timestamp))
    .bind(route.counters.total_stops)
    .bind(route.counters.completed_stops)
    .bind(route.counters.total_packages)
    .bind(route.counters.delivered_packages)
    .bind(route.total_distance_km)
    .bind(&route.notes)
    .bind(route.contract_id.map(|id| id.to_string()))
    .bind(&route.driver_id)
    .bind(&route.vehicle_id)
    .bind(&route.created_by)
    .bind(format_timestamp(&route.created_at))
    .bind(format_timestamp(&route.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_route(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Route>> {
    let row = sqlx::query(&format!("SELECT {} FROM routes WHERE id = ?", ROUTE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(route_from_row).transpose()
}

/// Load a route or fail with NotFound
pub async fn require_route(conn: &mut SqliteConnection, id: Uuid) -> Result<Route> {
    load_route(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Route {}", id)))
}

/// Route list filter
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub status: Option<RouteStatus>,
    pub scheduled_date: Option<NaiveDate>,
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RouteFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(date) = filter.scheduled_date {
        builder.push(" AND scheduled_date = ").push_bind(date.to_string());
    }
}

pub async fn count_routes(conn: &mut SqliteConnection, filter: &RouteFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM routes");
    push_filter(&mut builder, filter);

    let count: i64 = builder.build_query_scalar().fetch_one(&mut *conn).await?;
    Ok(count)
}

/// Newest scheduled date first, then route number
pub async fn list_routes(
    conn: &mut SqliteConnection,
    filter: &RouteFilter,
    offset: i64,
    limit: i64,
) -> Result<Vec<Route>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM routes", ROUTE_COLUMNS));
    push_filter(&mut builder, filter);
    builder
        .push(" ORDER BY scheduled_date DESC, route_number ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(&mut *conn).await?;
    rows.iter().map(route_from_row).collect()
}

/// Persist a status change with its timestamps
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: RouteStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE routes
        SET status = ?,
            started_at = COALESCE(?, started_at),
            completed_at = COALESCE(?, completed_at),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(started_at.as_ref().map(format_timestamp))
    .bind(completed_at.as_ref().map(format_timestamp))
    .bind(format_timestamp(&now))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rewrite the editable header fields of a route
pub async fn update_header(conn: &mut SqliteConnection, route: &Route) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE routes
        SET name = ?, scheduled_date = ?, notes = ?, contract_id = ?,
            driver_id = ?, vehicle_id = ?, total_distance_km = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&route.name)
    .bind(route.scheduled_date.to_string())
    .bind(&route.notes)
    .bind(route.contract_id.map(|id| id.to_string()))
    .bind(&route.driver_id)
    .bind(&route.vehicle_id)
    .bind(route.total_distance_km)
    .bind(format_timestamp(&route.updated_at))
    .bind(route.id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_route(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM routes WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Route with ordered stops, each with its packages
pub async fn load_route_detail(conn: &mut SqliteConnection, id: Uuid) -> Result<RouteDetail> {
    let route = require_route(conn, id).await?;
    let route_stops = stops::list_for_route(conn, id).await?;

    let mut by_stop: HashMap<Uuid, Vec<_>> = HashMap::new();
    for package in packages::list_for_route(conn, id).await? {
        if let Some(stop_id) = package.stop_id {
            by_stop.entry(stop_id).or_default().push(package);
        }
    }

    let stops = route_stops
        .into_iter()
        .map(|stop| {
            let packages = by_stop.remove(&stop.id).unwrap_or_default();
            StopDetail { stop, packages }
        })
        .collect();

    Ok(RouteDetail { route, stops })
}
