//! Database schema migrations
//!
//! Versioned, tracked in `schema_version`, and idempotent: each migration
//! checks the live schema before altering it, so running it against a
//! database that already has the change is a no-op.
//!
//! Never edit a released migration; add a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Latest applied version, 0 when none
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Migration v1: lookup indexes for the hot paths
///
/// Stops by route, packages by stop (cascades, counters), unassigned
/// package listing, and route listing by date.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_route_stops_route ON route_stops(route_id, stop_number)",
        "CREATE INDEX IF NOT EXISTS idx_packages_stop ON packages(stop_id)",
        "CREATE INDEX IF NOT EXISTS idx_packages_contract ON packages(contract_id)",
        "CREATE INDEX IF NOT EXISTS idx_routes_date_status ON routes(scheduled_date, status)",
        "CREATE INDEX IF NOT EXISTS idx_routes_contract ON routes(contract_id)",
        "CREATE INDEX IF NOT EXISTS idx_contracts_customer ON contracts(customer_id)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    info!("  Created lookup indexes");
    Ok(())
}

/// Migration v2: add packages.order_ref
///
/// Early databases predate legacy order linking.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "packages").await? {
        info!("  packages table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('packages') WHERE name = 'order_ref'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        return Ok(());
    }

    sqlx::query("ALTER TABLE packages ADD COLUMN order_ref TEXT")
        .execute(pool)
        .await?;

    info!("  Added order_ref column to packages table");
    Ok(())
}

/// Migration v3: add packages.access_code
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "packages").await? {
        info!("  packages table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('packages') WHERE name = 'access_code'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        return Ok(());
    }

    sqlx::query("ALTER TABLE packages ADD COLUMN access_code TEXT")
        .execute(pool)
        .await?;

    info!("  Added access_code column to packages table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn create_version_table(pool: &SqlitePool) {
        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_and_get_schema_version() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;

        set_schema_version(&pool, 1).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_migrate_v2_no_table() {
        let pool = setup_test_db().await;
        migrate_v2(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_v2_adds_column_once() {
        let pool = setup_test_db().await;

        // Legacy packages table without order_ref
        sqlx::query("CREATE TABLE packages (id TEXT PRIMARY KEY, barcode TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        migrate_v2(&pool).await.unwrap();
        migrate_v2(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('packages') WHERE name = 'order_ref'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_migrate_v3_adds_access_code_once() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE packages (id TEXT PRIMARY KEY, barcode TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        migrate_v3(&pool).await.unwrap();
        migrate_v3(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('packages') WHERE name = 'access_code'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_run_migrations_reaches_current_version() {
        let pool = setup_test_db().await;
        create_version_table(&pool).await;
        sqlx::query("CREATE TABLE packages (id TEXT PRIMARY KEY, stop_id TEXT, contract_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for table in [
            "CREATE TABLE route_stops (id TEXT PRIMARY KEY, route_id TEXT, stop_number INTEGER)",
            "CREATE TABLE routes (id TEXT PRIMARY KEY, scheduled_date TEXT, status TEXT, contract_id TEXT)",
            "CREATE TABLE contracts (id TEXT PRIMARY KEY, customer_id TEXT)",
        ] {
            sqlx::query(table).execute(&pool).await.unwrap();
        }

        run_migrations(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);

        // second run is a no-op
        run_migrations(&pool).await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
    }
}
