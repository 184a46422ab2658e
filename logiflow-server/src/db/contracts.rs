//! Contract persistence

use chrono::{DateTime, Utc};
use logiflow_common::deletion::DeletionPolicy;
use logiflow_common::models::{Contract, PricingModel};
use logiflow_common::time::{format_timestamp, parse_timestamp};
use logiflow_common::uuid_utils::{self, parse_column, parse_optional_column};
use logiflow_common::{Error, Result};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// A contract billed on any route or package is deactivated rather than removed
pub const CONTRACT_DELETION: DeletionPolicy = DeletionPolicy {
    entity: "Contract",
    table: "contracts",
    dependents_sql: "SELECT (SELECT COUNT(*) FROM routes WHERE contract_id = ?1) \
                     + (SELECT COUNT(*) FROM packages WHERE contract_id = ?1)",
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewContract {
    pub name: String,
    pub customer_id: Option<Uuid>,
    pub pricing_model: PricingModel,
    #[serde(default)]
    pub rate: f64,
}

impl NewContract {
    pub fn into_contract(self, now: DateTime<Utc>) -> Result<Contract> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Contract name is required".to_string()));
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid rate: {}", self.rate)));
        }

        Ok(Contract {
            id: uuid_utils::generate(),
            customer_id: self.customer_id,
            name: name.to_string(),
            pricing_model: self.pricing_model,
            rate: self.rate,
            is_active: true,
            created_at: now,
        })
    }
}

fn contract_from_row(row: &SqliteRow) -> Result<Contract> {
    let id: String = row.get("id");
    let pricing_model: String = row.get("pricing_model");
    let created_at: String = row.get("created_at");

    Ok(Contract {
        id: parse_column(&id)?,
        customer_id: parse_optional_column(row.get("customer_id"))?,
        name: row.get("name"),
        pricing_model: pricing_model.parse()?,
        rate: row.get("rate"),
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert_contract(conn: &mut SqliteConnection, contract: &Contract) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO contracts (id, customer_id, name, pricing_model, rate, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contract.id.to_string())
    .bind(contract.customer_id.map(|id| id.to_string()))
    .bind(&contract.name)
    .bind(contract.pricing_model.as_str())
    .bind(contract.rate)
    .bind(contract.is_active)
    .bind(format_timestamp(&contract.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_contract(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Contract>> {
    let row = sqlx::query(
        "SELECT id, customer_id, name, pricing_model, rate, is_active, created_at FROM contracts WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(contract_from_row).transpose()
}

/// Active contracts first, then by name
pub async fn list_contracts(conn: &mut SqliteConnection) -> Result<Vec<Contract>> {
    let rows = sqlx::query(
        "SELECT id, customer_id, name, pricing_model, rate, is_active, created_at FROM contracts ORDER BY is_active DESC, name",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(contract_from_row).collect()
}

/// Reject references to contracts that do not exist
pub async fn ensure_contract_exists(conn: &mut SqliteConnection, id: Option<Uuid>) -> Result<()> {
    let Some(id) = id else {
        return Ok(());
    };

    if load_contract(conn, id).await?.is_none() {
        return Err(Error::InvalidInput(format!("Unknown contract {}", id)));
    }
    Ok(())
}
