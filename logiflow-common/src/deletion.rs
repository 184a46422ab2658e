//! Delete-or-deactivate policy
//!
//! Records with dependents (a customer's contracts, a contract's routes and
//! packages) are deactivated instead of removed so references stay valid.
//! Each entity supplies a [`DeletionPolicy`]; the decision and the writes
//! live here once.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{Error, Result};

/// Entity-specific parameters of the policy
#[derive(Debug, Clone, Copy)]
pub struct DeletionPolicy {
    /// Label used in messages and logs
    pub entity: &'static str,
    /// Table holding the entity; must have `id` and `is_active` columns
    pub table: &'static str,
    /// Query counting dependents, binding the entity id once
    pub dependents_sql: &'static str,
}

/// What the policy did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionOutcome {
    /// Row removed
    Deleted,
    /// Row kept and marked inactive
    Deactivated { dependents: i64 },
}

/// Hard-delete the entity, or deactivate it if anything depends on it
pub async fn delete_or_deactivate(
    pool: &SqlitePool,
    policy: &DeletionPolicy,
    id: Uuid,
) -> Result<DeletionOutcome> {
    let mut tx = pool.begin().await?;
    let id_str = id.to_string();

    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)",
        policy.table
    ))
    .bind(&id_str)
    .fetch_one(&mut *tx)
    .await?;

    if !exists {
        return Err(Error::NotFound(format!("{} {}", policy.entity, id)));
    }

    let dependents: i64 = sqlx::query_scalar(policy.dependents_sql)
        .bind(&id_str)
        .fetch_one(&mut *tx)
        .await?;

    let outcome = if dependents > 0 {
        sqlx::query(&format!("UPDATE {} SET is_active = 0 WHERE id = ?", policy.table))
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        DeletionOutcome::Deactivated { dependents }
    } else {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", policy.table))
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        DeletionOutcome::Deleted
    };

    tx.commit().await?;

    info!(
        entity = policy.entity,
        id = %id,
        outcome = ?outcome,
        "Delete request handled"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_format() {
        let deleted = serde_json::to_value(DeletionOutcome::Deleted).unwrap();
        assert_eq!(deleted, serde_json::json!({"outcome": "DELETED"}));

        let kept = serde_json::to_value(DeletionOutcome::Deactivated { dependents: 3 }).unwrap();
        assert_eq!(kept, serde_json::json!({"outcome": "DEACTIVATED", "dependents": 3}));
    }
}
