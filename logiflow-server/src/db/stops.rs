//! Route stop persistence

use chrono::{DateTime, Utc};
use logiflow_common::lifecycle::StopTransition;
use logiflow_common::models::RouteStop;
use logiflow_common::time::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use logiflow_common::uuid_utils::parse_column;
use logiflow_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

const STOP_COLUMNS: &str = "id, route_id, stop_number, status, recipient_name, address, city, postal_code, \
     phone, latitude, longitude, access_code, instructions, signature, signed_by, proof_photo, \
     delivery_notes, failure_reason, actual_arrival, departure_time, delivery_latitude, \
     delivery_longitude, created_at, updated_at";

fn stop_from_row(row: &SqliteRow) -> Result<RouteStop> {
    let id: String = row.get("id");
    let route_id: String = row.get("route_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(RouteStop {
        id: parse_column(&id)?,
        route_id: parse_column(&route_id)?,
        stop_number: row.get("stop_number"),
        status: status.parse()?,
        recipient_name: row.get("recipient_name"),
        address: row.get("address"),
        city: row.get("city"),
        postal_code: row.get("postal_code"),
        phone: row.get("phone"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        access_code: row.get("access_code"),
        instructions: row.get("instructions"),
        signature: row.get("signature"),
        signed_by: row.get("signed_by"),
        proof_photo: row.get("proof_photo"),
        delivery_notes: row.get("delivery_notes"),
        failure_reason: row.get("failure_reason"),
        actual_arrival: parse_optional_timestamp(row.get("actual_arrival"))?,
        departure_time: parse_optional_timestamp(row.get("departure_time"))?,
        delivery_latitude: row.get("delivery_latitude"),
        delivery_longitude: row.get("delivery_longitude"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn insert_stop(conn: &mut SqliteConnection, stop: &RouteStop) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_stops (
            id, route_id, stop_number, status, recipient_name, address, city, postal_code,
            phone, latitude, longitude, access_code, instructions, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stop.id.to_string())
    .bind(stop.route_id.to_string())
    .bind(stop.stop_number)
    .bind(stop.status.as_str())
    .bind(&stop.recipient_name)
    .bind(&stop.address)
    .bind(&stop.city)
    .bind(&stop.postal_code)
    .bind(&stop.phone)
    .bind(stop.latitude)
    .bind(stop.longitude)
    .bind(&stop.access_code)
    .bind(&stop.instructions)
    .bind(format_timestamp(&stop.created_at))
    .bind(format_timestamp(&stop.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_stop(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<RouteStop>> {
    let row = sqlx::query(&format!("SELECT {} FROM route_stops WHERE id = ?", STOP_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(stop_from_row).transpose()
}

/// Load a stop or fail with NotFound
pub async fn require_stop(conn: &mut SqliteConnection, id: Uuid) -> Result<RouteStop> {
    load_stop(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Stop {}", id)))
}

/// Stops of a route in stop-number order
pub async fn list_for_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<Vec<RouteStop>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM route_stops WHERE route_id = ? ORDER BY stop_number ASC",
        STOP_COLUMNS
    ))
    .bind(route_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(stop_from_row).collect()
}

pub async fn count_for_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM route_stops WHERE route_id = ?")
        .bind(route_id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Column values a transition writes; `None` keeps the stored value
///
/// Arriving records the first arrival only; completing stamps both
/// `actual_arrival` and `departure_time` with the completion time.
#[derive(Debug, Default)]
struct StopChanges<'a> {
    signature: Option<&'a str>,
    signed_by: Option<&'a str>,
    proof_photo: Option<&'a str>,
    delivery_notes: Option<&'a str>,
    failure_reason: Option<&'a str>,
    actual_arrival: Option<String>,
    overwrite_arrival: bool,
    departure_time: Option<String>,
}

fn changes_for<'a>(transition: &'a StopTransition, now: &DateTime<Utc>) -> StopChanges<'a> {
    let stamp = format_timestamp(now);
    match transition {
        StopTransition::Start => StopChanges::default(),
        StopTransition::Arrive => StopChanges {
            actual_arrival: Some(stamp),
            ..Default::default()
        },
        StopTransition::Complete(proof) => StopChanges {
            signature: Some(proof.signature.as_str()),
            signed_by: Some(proof.signed_by.as_str()),
            proof_photo: proof.proof_photo.as_deref(),
            delivery_notes: proof.notes.as_deref(),
            actual_arrival: Some(stamp.clone()),
            overwrite_arrival: true,
            departure_time: Some(stamp),
            ..Default::default()
        },
        StopTransition::Fail {
            note,
            proof_photo,
            notes,
            ..
        } => StopChanges {
            failure_reason: Some(note.as_str()),
            proof_photo: proof_photo.as_deref(),
            delivery_notes: notes.as_deref(),
            ..Default::default()
        },
        StopTransition::Skip { note } => StopChanges {
            delivery_notes: note.as_deref(),
            ..Default::default()
        },
    }
}

/// Write a validated transition and the GPS position captured with it
pub async fn apply_transition(
    conn: &mut SqliteConnection,
    id: Uuid,
    transition: &StopTransition,
    position: Option<(f64, f64)>,
    now: DateTime<Utc>,
) -> Result<()> {
    let changes = changes_for(transition, &now);

    sqlx::query(
        r#"
        UPDATE route_stops
        SET status = ?,
            signature = COALESCE(?, signature),
            signed_by = COALESCE(?, signed_by),
            proof_photo = COALESCE(?, proof_photo),
            delivery_notes = COALESCE(?, delivery_notes),
            failure_reason = COALESCE(?, failure_reason),
            actual_arrival = CASE WHEN ? THEN ? ELSE COALESCE(actual_arrival, ?) END,
            departure_time = COALESCE(?, departure_time),
            delivery_latitude = COALESCE(?, delivery_latitude),
            delivery_longitude = COALESCE(?, delivery_longitude),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(transition.target().as_str())
    .bind(changes.signature)
    .bind(changes.signed_by)
    .bind(changes.proof_photo)
    .bind(changes.delivery_notes)
    .bind(changes.failure_reason)
    .bind(changes.overwrite_arrival)
    .bind(&changes.actual_arrival)
    .bind(&changes.actual_arrival)
    .bind(changes.departure_time)
    .bind(position.map(|(lat, _)| lat))
    .bind(position.map(|(_, lng)| lng))
    .bind(format_timestamp(&now))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_stop(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM route_stops WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_for_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM route_stops WHERE route_id = ?")
        .bind(route_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Close gaps so the route's stops are numbered 1..N again
///
/// Walks the stops in ascending order; each target number is either free
/// or was vacated by an earlier stop, so the unique constraint holds at
/// every step.
pub async fn renumber(conn: &mut SqliteConnection, route_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let current = list_for_route(conn, route_id).await?;
    let stamp = format_timestamp(&now);

    for (index, stop) in current.iter().enumerate() {
        let wanted = index as i64 + 1;
        if stop.stop_number != wanted {
            sqlx::query("UPDATE route_stops SET stop_number = ?, updated_at = ? WHERE id = ?")
                .bind(wanted)
                .bind(&stamp)
                .bind(stop.id.to_string())
                .execute(&mut *conn)
                .await?;
            debug!(stop_id = %stop.id, from = stop.stop_number, to = wanted, "Renumbered stop");
        }
    }

    Ok(())
}

/// Give each stop its 1-based position in `ordered`
///
/// Numbers are first parked on negatives so no intermediate state violates
/// the per-route unique constraint.
pub async fn set_order(
    conn: &mut SqliteConnection,
    route_id: Uuid,
    ordered: &[Uuid],
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE route_stops SET stop_number = -stop_number WHERE route_id = ?")
        .bind(route_id.to_string())
        .execute(&mut *conn)
        .await?;

    let stamp = format_timestamp(&now);
    for (index, stop_id) in ordered.iter().enumerate() {
        sqlx::query("UPDATE route_stops SET stop_number = ?, updated_at = ? WHERE id = ? AND route_id = ?")
            .bind(index as i64 + 1)
            .bind(&stamp)
            .bind(stop_id.to_string())
            .bind(route_id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
