//! Fare estimation and money formatting.

use crate::types::{haversine_km, GeoPoint};

const BASE_FARE_CENTS: i64 = 250;
const PER_KM_CENTS: i64 = 120;
const MINIMUM_FARE_CENTS: i64 = 500;

/// Estimate a fare from straight-line trip distance. Good enough for a
/// booking-time quote; actual routing distance is not modeled here.
pub fn estimate_fare_cents(pickup: GeoPoint, dropoff: GeoPoint) -> i64 {
    let km = haversine_km(pickup, dropoff);
    let raw = BASE_FARE_CENTS + (km * PER_KM_CENTS as f64).round() as i64;
    raw.max(MINIMUM_FARE_CENTS)
}

/// Format a cent amount as a dollar string, e.g. `1234` → `"$12.34"`.
pub fn format_fare(cents: i64) -> String {
    let cents = cents.max(0);
    format!("${}.{:02}", cents / 100, cents % 100)
}
