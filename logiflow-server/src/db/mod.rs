//! Persistence operations
//!
//! Every function takes a bare connection so it can run on a pooled
//! connection or inside a caller's transaction (`&mut *tx`).

pub mod aggregates;
pub mod contracts;
pub mod customers;
pub mod packages;
pub mod routes;
pub mod stops;
