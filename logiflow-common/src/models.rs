//! Delivery domain models
//!
//! Route → RouteStop → Package aggregation plus the billing collaborators
//! (Customer, Contract). Status enums are persisted as their
//! SCREAMING_SNAKE_CASE names, matching the JSON representation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

// ============================================================================
// Status enums
// ============================================================================

/// Route lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    /// Structure (stops/packages) still editable
    Draft,
    /// Validated by dispatch, not yet on the road
    Planned,
    /// Driver is out delivering
    InProgress,
    /// All work done
    Completed,
    /// Abandoned before completion
    Cancelled,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Draft => "DRAFT",
            RouteStatus::Planned => "PLANNED",
            RouteStatus::InProgress => "IN_PROGRESS",
            RouteStatus::Completed => "COMPLETED",
            RouteStatus::Cancelled => "CANCELLED",
        }
    }

    /// Completed and Cancelled routes accept no further changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteStatus::Completed | RouteStatus::Cancelled)
    }
}

impl FromStr for RouteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(RouteStatus::Draft),
            "PLANNED" => Ok(RouteStatus::Planned),
            "IN_PROGRESS" => Ok(RouteStatus::InProgress),
            "COMPLETED" => Ok(RouteStatus::Completed),
            "CANCELLED" => Ok(RouteStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("Unknown route status: {}", other))),
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stop delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Pending,
    InProgress,
    Arrived,
    Completed,
    Failed,
    Skipped,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopStatus::Pending => "PENDING",
            StopStatus::InProgress => "IN_PROGRESS",
            StopStatus::Arrived => "ARRIVED",
            StopStatus::Completed => "COMPLETED",
            StopStatus::Failed => "FAILED",
            StopStatus::Skipped => "SKIPPED",
        }
    }

    /// No code path leaves Completed, Failed or Skipped
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StopStatus::Completed | StopStatus::Failed | StopStatus::Skipped
        )
    }
}

impl FromStr for StopStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StopStatus::Pending),
            "IN_PROGRESS" => Ok(StopStatus::InProgress),
            "ARRIVED" => Ok(StopStatus::Arrived),
            "COMPLETED" => Ok(StopStatus::Completed),
            "FAILED" => Ok(StopStatus::Failed),
            "SKIPPED" => Ok(StopStatus::Skipped),
            other => Err(Error::InvalidInput(format!("Unknown stop status: {}", other))),
        }
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Pending,
    InTransit,
    OutForDelivery,
    Delivered,
    Failed,
    Returned,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "PENDING",
            PackageStatus::InTransit => "IN_TRANSIT",
            PackageStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            PackageStatus::Delivered => "DELIVERED",
            PackageStatus::Failed => "FAILED",
            PackageStatus::Returned => "RETURNED",
        }
    }
}

impl FromStr for PackageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PackageStatus::Pending),
            "IN_TRANSIT" => Ok(PackageStatus::InTransit),
            "OUT_FOR_DELIVERY" => Ok(PackageStatus::OutForDelivery),
            "DELIVERED" => Ok(PackageStatus::Delivered),
            "FAILED" => Ok(PackageStatus::Failed),
            "RETURNED" => Ok(PackageStatus::Returned),
            other => Err(Error::InvalidInput(format!("Unknown package status: {}", other))),
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract pricing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingModel {
    PerStop,
    PerPackage,
    PerKm,
}

impl PricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::PerStop => "PER_STOP",
            PricingModel::PerPackage => "PER_PACKAGE",
            PricingModel::PerKm => "PER_KM",
        }
    }
}

impl FromStr for PricingModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PER_STOP" => Ok(PricingModel::PerStop),
            "PER_PACKAGE" => Ok(PricingModel::PerPackage),
            "PER_KM" => Ok(PricingModel::PerKm),
            other => Err(Error::InvalidInput(format!("Unknown pricing model: {}", other))),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Denormalized route counters
///
/// A cache over the route's stops and packages. Always recomputed as a
/// whole, never incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCounters {
    pub total_stops: i64,
    pub completed_stops: i64,
    pub total_packages: i64,
    pub delivered_packages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    /// Human route number, `RT-YYYYMMDD-NNN`
    pub route_number: String,
    pub name: Option<String>,
    pub status: RouteStatus,
    pub scheduled_date: NaiveDate,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub counters: RouteCounters,
    pub total_distance_km: Option<f64>,
    pub notes: Option<String>,
    pub contract_id: Option<Uuid>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    /// 1-based, contiguous within the route
    pub stop_number: i64,
    pub status: StopStatus,
    pub recipient_name: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub access_code: Option<String>,
    pub instructions: Option<String>,

    // Delivery proof / evidence
    pub signature: Option<String>,
    pub signed_by: Option<String>,
    pub proof_photo: Option<String>,
    pub delivery_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    /// System generated, unique
    pub barcode: String,
    pub external_barcode: Option<String>,
    pub description: Option<String>,
    pub weight_kg: Option<f64>,
    pub status: PackageStatus,
    pub stop_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    /// Legacy order reference
    pub order_ref: Option<String>,

    // Destination, used when grouping unassigned packages into stops
    pub recipient_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub access_code: Option<String>,
    pub instructions: Option<String>,

    // Proof mirrored from the owning stop
    pub signature: Option<String>,
    pub signed_by: Option<String>,
    pub proof_photo: Option<String>,
    pub delivery_notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stop with its packages
#[derive(Debug, Clone, Serialize)]
pub struct StopDetail {
    #[serde(flatten)]
    pub stop: RouteStop,
    pub packages: Vec<Package>,
}

/// Route with its ordered stops
#[derive(Debug, Clone, Serialize)]
pub struct RouteDetail {
    #[serde(flatten)]
    pub route: Route,
    pub stops: Vec<StopDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub name: String,
    pub pricing_model: PricingModel,
    pub rate: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_status_names_match_storage() {
        for status in [
            RouteStatus::Draft,
            RouteStatus::Planned,
            RouteStatus::InProgress,
            RouteStatus::Completed,
            RouteStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<RouteStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_stop_terminal_states() {
        assert!(StopStatus::Completed.is_terminal());
        assert!(StopStatus::Failed.is_terminal());
        assert!(StopStatus::Skipped.is_terminal());
        assert!(!StopStatus::Arrived.is_terminal());
        assert!(!StopStatus::Pending.is_terminal());
    }

    #[test]
    fn test_unknown_status_is_invalid_input() {
        let err = "SHIPPED".parse::<PackageStatus>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_package_status_uses_screaming_snake_case() {
        let json = serde_json::to_string(&PackageStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
    }
}
