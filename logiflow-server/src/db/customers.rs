//! Customer persistence

use chrono::{DateTime, Utc};
use logiflow_common::deletion::DeletionPolicy;
use logiflow_common::models::Customer;
use logiflow_common::time::{format_timestamp, parse_timestamp};
use logiflow_common::uuid_utils::{self, parse_column};
use logiflow_common::{Error, Result};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// A customer with contracts is deactivated rather than removed
pub const CUSTOMER_DELETION: DeletionPolicy = DeletionPolicy {
    entity: "Customer",
    table: "customers",
    dependents_sql: "SELECT COUNT(*) FROM contracts WHERE customer_id = ?",
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewCustomer {
    pub fn into_customer(self, now: DateTime<Utc>) -> Result<Customer> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Customer name is required".to_string()));
        }

        Ok(Customer {
            id: uuid_utils::generate(),
            name: name.to_string(),
            email: self.email,
            phone: self.phone,
            address: self.address,
            is_active: true,
            created_at: now,
        })
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");

    Ok(Customer {
        id: parse_column(&id)?,
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert_customer(conn: &mut SqliteConnection, customer: &Customer) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, name, email, phone, address, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(customer.id.to_string())
    .bind(&customer.name)
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(&customer.address)
    .bind(customer.is_active)
    .bind(format_timestamp(&customer.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_customer(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Customer>> {
    let row = sqlx::query(
        "SELECT id, name, email, phone, address, is_active, created_at FROM customers WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(customer_from_row).transpose()
}

/// Active customers first, then by name
pub async fn list_customers(conn: &mut SqliteConnection) -> Result<Vec<Customer>> {
    let rows = sqlx::query(
        "SELECT id, name, email, phone, address, is_active, created_at FROM customers ORDER BY is_active DESC, name",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(customer_from_row).collect()
}
