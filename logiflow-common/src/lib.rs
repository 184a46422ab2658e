//! # LogiFlow Common Library
//!
//! Shared code for the LogiFlow delivery services including:
//! - Database initialization, schema and migrations
//! - Route / stop / package models and status enums
//! - Delivery lifecycle rules (route and stop state machines)
//! - Address grouping of packages into stops
//! - Bulk import column mapping
//! - Navigation link construction
//! - Configuration loading

pub mod config;
pub mod db;
pub mod deletion;
pub mod error;
pub mod grouping;
pub mod import;
pub mod lifecycle;
pub mod maps;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
