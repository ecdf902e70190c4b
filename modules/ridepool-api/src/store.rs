//! Ride persistence.
//!
//! The only write path for `status` is `apply_transition`, a conditional
//! update keyed on the prior status. Two concurrent transitions against
//! the same ride cannot both win; the loser sees `Conflict` and must
//! re-fetch and re-decide.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_common::{GeoPoint, Ride, RideStatus, TransitionOutcome};

/// Result of the conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// The stored status no longer matched the expected prior status.
    Conflict,
}

#[async_trait]
pub trait RideStore: Send + Sync {
    async fn create(&self, ride: &Ride) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ride>>;
    /// Rides where the user is rider or driver, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Ride>>;
    /// Apply a decided transition iff the stored status still equals
    /// `expected_prior`.
    async fn apply_transition(
        &self,
        id: Uuid,
        expected_prior: RideStatus,
        outcome: &TransitionOutcome,
        entered_at: DateTime<Utc>,
    ) -> Result<CasOutcome>;
}

pub struct PgRideStore {
    pool: PgPool,
}

impl PgRideStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

type RideRow = (
    Uuid,              // id
    String,            // status
    Uuid,              // rider_id
    Option<Uuid>,      // driver_id
    bool,              // rider_rated
    f64,               // pickup_lat
    f64,               // pickup_lng
    f64,               // dropoff_lat
    f64,               // dropoff_lng
    i64,               // fare_cents
    serde_json::Value, // timestamps
    DateTime<Utc>,     // created_at
);

const RIDE_COLUMNS: &str = "id, status, rider_id, driver_id, rider_rated, \
     pickup_lat, pickup_lng, dropoff_lat, dropoff_lng, fare_cents, timestamps, created_at";

fn row_to_ride(r: RideRow) -> Result<Ride> {
    let status =
        RideStatus::parse(&r.1).ok_or_else(|| anyhow!("unknown ride status in row: {}", r.1))?;
    Ok(Ride {
        id: r.0,
        status,
        rider_id: r.2,
        driver_id: r.3,
        rider_rated: r.4,
        pickup: GeoPoint { lat: r.5, lng: r.6 },
        dropoff: GeoPoint { lat: r.7, lng: r.8 },
        fare_cents: r.9,
        timestamps: serde_json::from_value(r.10)
            .map_err(|e| anyhow!("malformed timestamps column: {e}"))?,
        created_at: r.11,
    })
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[async_trait]
impl RideStore for PgRideStore {
    async fn create(&self, ride: &Ride) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rides
                (id, status, rider_id, driver_id, rider_rated,
                 pickup_lat, pickup_lng, dropoff_lat, dropoff_lng,
                 fare_cents, timestamps, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(ride.id)
        .bind(ride.status.as_str())
        .bind(ride.rider_id)
        .bind(ride.driver_id)
        .bind(ride.rider_rated)
        .bind(ride.pickup.lat)
        .bind(ride.pickup.lng)
        .bind(ride.dropoff.lat)
        .bind(ride.dropoff.lng)
        .bind(ride.fare_cents)
        .bind(serde_json::to_value(&ride.timestamps)?)
        .bind(ride.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ride>> {
        let row = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_ride).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Ride>> {
        let limit = limit.min(100) as i64;

        let rows = sqlx::query_as::<_, RideRow>(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE rider_id = $1 OR driver_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_ride).collect()
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected_prior: RideStatus,
        outcome: &TransitionOutcome,
        entered_at: DateTime<Utc>,
    ) -> Result<CasOutcome> {
        let mut stamp = serde_json::Map::new();
        stamp.insert(
            outcome.new_status.as_str().to_string(),
            serde_json::to_value(entered_at)?,
        );

        // Zero rows affected means the status moved under us (the caller
        // verified existence when it loaded the ride).
        let result = sqlx::query(
            r#"
            UPDATE rides
            SET status = $3,
                driver_id = COALESCE($4, driver_id),
                timestamps = timestamps || $5
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected_prior.as_str())
        .bind(outcome.new_status.as_str())
        .bind(outcome.assigned_driver)
        .bind(serde_json::Value::Object(stamp))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(CasOutcome::Conflict)
        } else {
            Ok(CasOutcome::Applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> RideRow {
        (
            Uuid::new_v4(),
            "accepted".to_string(),
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            false,
            44.98,
            -93.26,
            44.95,
            -93.09,
            1250,
            serde_json::json!({
                "pending": "2026-08-01T12:00:00Z",
                "accepted": "2026-08-01T12:02:30Z",
            }),
            Utc::now(),
        )
    }

    #[test]
    fn maps_row_to_ride() {
        let row = sample_row();
        let ride = row_to_ride(row).unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert!(ride.driver_id.is_some());
        assert_eq!(ride.fare_cents, 1250);
        assert!(ride.entered_at(RideStatus::Accepted).is_some());
        assert!(ride.entered_at(RideStatus::Completed).is_none());
    }

    #[test]
    fn rejects_unknown_status() {
        let mut row = sample_row();
        row.1 = "riding".to_string();
        assert!(row_to_ride(row).is_err());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let mut row = sample_row();
        row.10 = serde_json::json!({"pending": 42});
        assert!(row_to_ride(row).is_err());
    }
}
