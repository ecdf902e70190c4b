use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Principals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Rider => write!(f, "rider"),
            Role::Driver => write!(f, "driver"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "rider" => Some(Role::Rider),
            "driver" => Some(Role::Driver),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// An authenticated actor. Always produced by token verification upstream;
/// the lifecycle core treats it as opaque input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

// --- Ride Status ---

/// Lifecycle position of a ride. `Ord` follows forward lifecycle progress;
/// `Cancelled` sorts last but sits outside the forward path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RideStatus {
    /// The canonical forward path, in order. `Cancelled` is a side branch.
    pub const FORWARD_ORDER: [RideStatus; 4] = [
        RideStatus::Pending,
        RideStatus::Accepted,
        RideStatus::InProgress,
        RideStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<RideStatus> {
        match s {
            "pending" => Some(RideStatus::Pending),
            "accepted" => Some(RideStatus::Accepted),
            "in_progress" => Some(RideStatus::InProgress),
            "completed" => Some(RideStatus::Completed),
            "cancelled" => Some(RideStatus::Cancelled),
            _ => None,
        }
    }

    /// Position along the forward path, `None` for `Cancelled`.
    pub fn forward_position(&self) -> Option<usize> {
        Self::FORWARD_ORDER.iter().position(|s| s == self)
    }

    /// Short label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            RideStatus::Pending => "Requested",
            RideStatus::Accepted => "Driver assigned",
            RideStatus::InProgress => "On the way",
            RideStatus::Completed => "Completed",
            RideStatus::Cancelled => "Cancelled",
        }
    }

    /// One-line description for progress displays.
    pub fn describe(&self) -> &'static str {
        match self {
            RideStatus::Pending => "Waiting for a driver to accept the ride",
            RideStatus::Accepted => "A driver accepted and is heading to the pickup point",
            RideStatus::InProgress => "The ride is underway",
            RideStatus::Completed => "The rider was dropped off",
            RideStatus::Cancelled => "The ride was cancelled",
        }
    }
}

// --- Ride ---

/// A single trip request. The status field is mutated exclusively through
/// the lifecycle transition path; no other writer touches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub status: RideStatus,
    pub rider_id: Uuid,
    /// Set exactly when a driver accepts; stays set through cancellation.
    pub driver_id: Option<Uuid>,
    /// Whether the rider already rated this ride. Rating itself is an
    /// external concern; this only feeds the completed notification.
    pub rider_rated: bool,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub fare_cents: i64,
    /// Instant each status was entered. Append-only; a status appears at
    /// most once because the transition table admits no re-entry.
    pub timestamps: BTreeMap<RideStatus, DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Ride {
    /// A fresh ride in `Pending`, fare estimated from the trip distance.
    pub fn request(rider_id: Uuid, pickup: GeoPoint, dropoff: GeoPoint) -> Ride {
        let now = Utc::now();
        let mut timestamps = BTreeMap::new();
        timestamps.insert(RideStatus::Pending, now);
        Ride {
            id: Uuid::new_v4(),
            status: RideStatus::Pending,
            rider_id,
            driver_id: None,
            rider_rated: false,
            pickup,
            dropoff,
            fare_cents: crate::fare::estimate_fare_cents(pickup, dropoff),
            timestamps,
            created_at: now,
        }
    }

    pub fn entered_at(&self, status: RideStatus) -> Option<DateTime<Utc>> {
        self.timestamps.get(&status).copied()
    }

    /// The furthest forward status this ride actually entered. For active
    /// rides this equals `status`; for cancelled rides it is the position
    /// the ride had reached when it was cancelled.
    pub fn last_forward_status(&self) -> Option<RideStatus> {
        RideStatus::FORWARD_ORDER
            .iter()
            .rev()
            .find(|s| self.timestamps.contains_key(s))
            .copied()
    }
}
