//! UUID utilities

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID read back from a TEXT column
pub fn parse_column(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Corrupt id '{}' in database: {}", value, e)))
}

/// Parse an optional UUID column
pub fn parse_optional_column(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_column).transpose()
}
