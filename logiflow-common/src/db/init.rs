//! Database initialization
//!
//! Opens (creating if needed) the SQLite file, builds every table
//! idempotently, then runs versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open the database at `db_path` and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and run migrations on an already-open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_customers_table(pool).await?;
    create_contracts_table(pool).await?;
    create_routes_table(pool).await?;
    create_route_stops_table(pool).await?;
    create_packages_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            address TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contracts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
            id TEXT PRIMARY KEY,
            customer_id TEXT REFERENCES customers(id),
            name TEXT NOT NULL,
            pricing_model TEXT NOT NULL
                CHECK (pricing_model IN ('PER_STOP', 'PER_PACKAGE', 'PER_KM')),
            rate REAL NOT NULL DEFAULT 0 CHECK (rate >= 0),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_routes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS routes (
            id TEXT PRIMARY KEY,
            route_number TEXT NOT NULL UNIQUE,
            name TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT'
                CHECK (status IN ('DRAFT', 'PLANNED', 'IN_PROGRESS', 'COMPLETED', 'CANCELLED')),
            scheduled_date TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            total_stops INTEGER NOT NULL DEFAULT 0 CHECK (total_stops >= 0),
            completed_stops INTEGER NOT NULL DEFAULT 0
                CHECK (completed_stops >= 0 AND completed_stops <= total_stops),
            total_packages INTEGER NOT NULL DEFAULT 0 CHECK (total_packages >= 0),
            delivered_packages INTEGER NOT NULL DEFAULT 0
                CHECK (delivered_packages >= 0 AND delivered_packages <= total_packages),
            total_distance_km REAL,
            notes TEXT,
            contract_id TEXT REFERENCES contracts(id),
            driver_id TEXT,
            vehicle_id TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_route_stops_table(pool: &SqlitePool) -> Result<()> {
    // stop_number may go negative transiently while a reorder is in flight
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS route_stops (
            id TEXT PRIMARY KEY,
            route_id TEXT NOT NULL REFERENCES routes(id),
            stop_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'IN_PROGRESS', 'ARRIVED', 'COMPLETED', 'FAILED', 'SKIPPED')),
            recipient_name TEXT,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            phone TEXT,
            latitude REAL,
            longitude REAL,
            access_code TEXT,
            instructions TEXT,
            signature TEXT,
            signed_by TEXT,
            proof_photo TEXT,
            delivery_notes TEXT,
            failure_reason TEXT,
            actual_arrival TEXT,
            departure_time TEXT,
            delivery_latitude REAL,
            delivery_longitude REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (route_id, stop_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_packages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS packages (
            id TEXT PRIMARY KEY,
            barcode TEXT NOT NULL UNIQUE,
            external_barcode TEXT,
            description TEXT,
            weight_kg REAL CHECK (weight_kg IS NULL OR weight_kg >= 0),
            status TEXT NOT NULL DEFAULT 'PENDING'
                CHECK (status IN ('PENDING', 'IN_TRANSIT', 'OUT_FOR_DELIVERY', 'DELIVERED', 'FAILED', 'RETURNED')),
            stop_id TEXT REFERENCES route_stops(id),
            contract_id TEXT REFERENCES contracts(id),
            order_ref TEXT,
            recipient_name TEXT,
            address TEXT,
            city TEXT,
            postal_code TEXT,
            phone TEXT,
            access_code TEXT,
            instructions TEXT,
            signature TEXT,
            signed_by TEXT,
            proof_photo TEXT,
            delivery_notes TEXT,
            delivered_at TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
