//! Package persistence

use chrono::{DateTime, Utc};
use logiflow_common::lifecycle::StopTransition;
use logiflow_common::models::{Package, PackageStatus};
use logiflow_common::time::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use logiflow_common::uuid_utils::{self, parse_column, parse_optional_column};
use logiflow_common::{Error, Result};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const PACKAGE_COLUMNS: &str = "p.id, p.barcode, p.external_barcode, p.description, p.weight_kg, p.status, \
     p.stop_id, p.contract_id, p.order_ref, p.recipient_name, p.address, p.city, p.postal_code, \
     p.phone, p.access_code, p.instructions, p.signature, p.signed_by, p.proof_photo, p.delivery_notes, \
     p.delivered_at, p.created_by, p.created_at, p.updated_at";

/// Package fields supplied by a client or an import row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPackage {
    pub description: Option<String>,
    pub weight_kg: Option<f64>,
    pub external_barcode: Option<String>,
    pub contract_id: Option<Uuid>,
    pub order_ref: Option<String>,
    pub recipient_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub access_code: Option<String>,
    pub instructions: Option<String>,
}

/// System barcode: `PKG-` and 12 uppercase hex characters
pub fn generate_barcode() -> String {
    let hex = uuid_utils::generate().simple().to_string().to_uppercase();
    format!("PKG-{}", &hex[..12])
}

impl NewPackage {
    /// Build a Pending package, optionally already under a stop
    pub fn into_package(self, stop_id: Option<Uuid>, created_by: &str, now: DateTime<Utc>) -> Result<Package> {
        if let Some(weight) = self.weight_kg {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidInput(format!("Invalid weight: {}", weight)));
            }
        }

        Ok(Package {
            id: uuid_utils::generate(),
            barcode: generate_barcode(),
            external_barcode: self.external_barcode,
            description: self.description,
            weight_kg: self.weight_kg,
            status: PackageStatus::Pending,
            stop_id,
            contract_id: self.contract_id,
            order_ref: self.order_ref,
            recipient_name: self.recipient_name,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            phone: self.phone,
            access_code: self.access_code,
            instructions: self.instructions,
            signature: None,
            signed_by: None,
            proof_photo: None,
            delivery_notes: None,
            delivered_at: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

fn package_from_row(row: &SqliteRow) -> Result<Package> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Package {
        id: parse_column(&id)?,
        barcode: row.get("barcode"),
        external_barcode: row.get("external_barcode"),
        description: row.get("description"),
        weight_kg: row.get("weight_kg"),
        status: status.parse()?,
        stop_id: parse_optional_column(row.get("stop_id"))?,
        contract_id: parse_optional_column(row.get("contract_id"))?,
        order_ref: row.get("order_ref"),
        recipient_name: row.get("recipient_name"),
        address: row.get("address"),
        city: row.get("city"),
        postal_code: row.get("postal_code"),
        phone: row.get("phone"),
        access_code: row.get("access_code"),
        instructions: row.get("instructions"),
        signature: row.get("signature"),
        signed_by: row.get("signed_by"),
        proof_photo: row.get("proof_photo"),
        delivery_notes: row.get("delivery_notes"),
        delivered_at: parse_optional_timestamp(row.get("delivered_at"))?,
        created_by: row.get("created_by"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn insert_package(conn: &mut SqliteConnection, package: &Package) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO packages (
            id, barcode, external_barcode, description, weight_kg, status, stop_id, contract_id,
            order_ref, recipient_name, address, city, postal_code, phone, access_code,
            instructions, created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(package.id.to_string())
    .bind(&package.barcode)
    .bind(&package.external_barcode)
    .bind(&package.description)
    .bind(package.weight_kg)
    .bind(package.status.as_str())
    .bind(package.stop_id.map(|id| id.to_string()))
    .bind(package.contract_id.map(|id| id.to_string()))
    .bind(&package.order_ref)
    .bind(&package.recipient_name)
    .bind(&package.address)
    .bind(&package.city)
    .bind(&package.postal_code)
    .bind(&package.phone)
    .bind(&package.access_code)
    .bind(&package.instructions)
    .bind(&package.created_by)
    .bind(format_timestamp(&package.created_at))
    .bind(format_timestamp(&package.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_package(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Package>> {
    let row = sqlx::query(&format!("SELECT {} FROM packages p WHERE p.id = ?", PACKAGE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(package_from_row).transpose()
}

/// Load a package or fail with NotFound
pub async fn require_package(conn: &mut SqliteConnection, id: Uuid) -> Result<Package> {
    load_package(conn, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Package {}", id)))
}

pub async fn list_for_stop(conn: &mut SqliteConnection, stop_id: Uuid) -> Result<Vec<Package>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM packages p WHERE p.stop_id = ? ORDER BY p.created_at, p.barcode",
        PACKAGE_COLUMNS
    ))
    .bind(stop_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(package_from_row).collect()
}

/// Every package under any stop of the route
pub async fn list_for_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<Vec<Package>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM packages p
        JOIN route_stops s ON s.id = p.stop_id
        WHERE s.route_id = ?
        ORDER BY s.stop_number, p.created_at, p.barcode
        "#,
        PACKAGE_COLUMNS
    ))
    .bind(route_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(package_from_row).collect()
}

pub async fn count_packages(conn: &mut SqliteConnection, unassigned_only: bool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM packages WHERE (? = 0 OR stop_id IS NULL)",
    )
    .bind(unassigned_only)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Newest first
pub async fn list_packages(
    conn: &mut SqliteConnection,
    unassigned_only: bool,
    offset: i64,
    limit: i64,
) -> Result<Vec<Package>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM packages p
        WHERE (? = 0 OR p.stop_id IS NULL)
        ORDER BY p.created_at DESC, p.barcode
        LIMIT ? OFFSET ?
        "#,
        PACKAGE_COLUMNS
    ))
    .bind(unassigned_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(package_from_row).collect()
}

pub async fn assign_to_stop(
    conn: &mut SqliteConnection,
    package_id: Uuid,
    stop_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE packages SET stop_id = ?, updated_at = ? WHERE id = ?")
        .bind(stop_id.to_string())
        .bind(format_timestamp(&now))
        .bind(package_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Mirror a stop's Completed/Failed outcome onto all of its packages
///
/// Returns the number of packages updated; other transitions leave
/// packages untouched.
pub async fn cascade_transition(
    conn: &mut SqliteConnection,
    stop_id: Uuid,
    transition: &StopTransition,
    now: DateTime<Utc>,
) -> Result<u64> {
    let stamp = format_timestamp(&now);

    let result = match transition {
        StopTransition::Complete(proof) => {
            sqlx::query(
                r#"
                UPDATE packages
                SET status = ?, signature = ?, signed_by = ?, proof_photo = ?,
                    delivery_notes = ?, delivered_at = ?, updated_at = ?
                WHERE stop_id = ?
                "#,
            )
            .bind(PackageStatus::Delivered.as_str())
            .bind(&proof.signature)
            .bind(&proof.signed_by)
            .bind(&proof.proof_photo)
            .bind(&proof.notes)
            .bind(&stamp)
            .bind(&stamp)
            .bind(stop_id.to_string())
            .execute(&mut *conn)
            .await?
        }
        StopTransition::Fail { note, .. } => {
            sqlx::query(
                "UPDATE packages SET status = ?, delivery_notes = ?, updated_at = ? WHERE stop_id = ?",
            )
            .bind(PackageStatus::Failed.as_str())
            .bind(note)
            .bind(&stamp)
            .bind(stop_id.to_string())
            .execute(&mut *conn)
            .await?
        }
        _ => return Ok(0),
    };

    Ok(result.rows_affected())
}

/// Packages still at the depot go out with the driver when a route starts
pub async fn mark_out_for_delivery(
    conn: &mut SqliteConnection,
    route_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE packages
        SET status = ?, updated_at = ?
        WHERE status IN (?, ?)
          AND stop_id IN (SELECT id FROM route_stops WHERE route_id = ?)
        "#,
    )
    .bind(PackageStatus::OutForDelivery.as_str())
    .bind(format_timestamp(&now))
    .bind(PackageStatus::Pending.as_str())
    .bind(PackageStatus::InTransit.as_str())
    .bind(route_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_for_stop(conn: &mut SqliteConnection, stop_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM packages WHERE stop_id = ?")
        .bind(stop_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_for_route(conn: &mut SqliteConnection, route_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM packages WHERE stop_id IN (SELECT id FROM route_stops WHERE route_id = ?)",
    )
    .bind(route_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_shape() {
        let barcode = generate_barcode();
        assert_eq!(barcode.len(), 16);
        assert!(barcode.starts_with("PKG-"));
        assert!(barcode[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_barcodes_differ() {
        assert_ne!(generate_barcode(), generate_barcode());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let input = NewPackage {
            weight_kg: Some(-2.0),
            ..Default::default()
        };
        let err = input.into_package(None, "tester", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
