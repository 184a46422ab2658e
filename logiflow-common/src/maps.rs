//! Google Maps multi-stop navigation links
//!
//! The last stop is always the destination. The origin is the driver's
//! current position when known, otherwise the first stop. Everything in
//! between becomes a waypoint, capped at [`MAX_WAYPOINTS`]; the tail is
//! dropped when the cap is exceeded.

use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum intermediate stops Google Maps accepts in one link
pub const MAX_WAYPOINTS: usize = 8;

const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/";

/// GPS position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    fn as_param(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Stop address as rendered in the link
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStop {
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl NavigationStop {
    pub fn new(address: impl Into<String>, city: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            postal_code: postal_code.into(),
        }
    }

    /// `12 Rue X, 75001 Paris`
    pub fn as_param(&self) -> String {
        format!("{}, {} {}", self.address.trim(), self.postal_code.trim(), self.city.trim())
    }
}

/// Built navigation link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationLink {
    pub url: String,
    /// Some waypoints were dropped; only a prefix of the route is navigable
    pub truncated: bool,
    pub waypoint_count: usize,
}

/// Build a turn-by-turn link for the stops in order
///
/// Returns `None` for an empty stop list.
pub fn build_navigation_url(stops: &[NavigationStop], current: Option<Coordinates>) -> Option<NavigationLink> {
    let (destination, before_destination) = stops.split_last()?;

    let (origin, intermediate): (Option<String>, &[NavigationStop]) = match (current, before_destination) {
        (Some(position), rest) => (Some(position.as_param()), rest),
        (None, []) => (None, &[]),
        (None, [first, rest @ ..]) => (Some(first.as_param()), rest),
    };

    let truncated = intermediate.len() > MAX_WAYPOINTS;
    let waypoints: Vec<String> = intermediate
        .iter()
        .take(MAX_WAYPOINTS)
        .map(NavigationStop::as_param)
        .collect();

    let mut params: Vec<(&str, String)> = vec![("api", "1".to_string())];
    if let Some(origin) = origin {
        params.push(("origin", origin));
    }
    params.push(("destination", destination.as_param()));
    if !waypoints.is_empty() {
        params.push(("waypoints", waypoints.join("|")));
    }
    params.push(("travelmode", "driving".to_string()));

    let url = Url::parse_with_params(DIRECTIONS_BASE, &params).ok()?;

    Some(NavigationLink {
        url: url.to_string(),
        truncated,
        waypoint_count: waypoints.len(),
    })
}
