//! Transition execution.
//!
//! Load the ride, run the pure lifecycle decision, apply it with the
//! store's conditional update, then publish the derived notification.
//! A lost race is retried exactly once against fresh state before
//! surfacing `Conflict` to the client. Nothing is published for a failed
//! or conflicted attempt.

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use ridepool_common::{attempt_transition, Principal, Ride, RideStatus, TransitionError};

use crate::notify::NotificationSink;
use crate::store::{CasOutcome, RideStore};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ride {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Decision(#[from] TransitionError),

    #[error("ride state changed, please refresh")]
    Conflict,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub async fn execute_transition(
    store: &dyn RideStore,
    sink: &dyn NotificationSink,
    ride_id: Uuid,
    requested: RideStatus,
    principal: Principal,
) -> Result<Ride, ServiceError> {
    match try_transition(store, sink, ride_id, requested, principal).await {
        // Lost a race: the decision was computed against stale state.
        // Re-fetch and re-decide once; a second conflict surfaces.
        Err(ServiceError::Conflict) => {
            try_transition(store, sink, ride_id, requested, principal).await
        }
        other => other,
    }
}

async fn try_transition(
    store: &dyn RideStore,
    sink: &dyn NotificationSink,
    ride_id: Uuid,
    requested: RideStatus,
    principal: Principal,
) -> Result<Ride, ServiceError> {
    let ride = store
        .find_by_id(ride_id)
        .await?
        .ok_or(ServiceError::NotFound(ride_id))?;

    let outcome = attempt_transition(&ride, requested, principal)?;
    let entered_at = Utc::now();

    match store
        .apply_transition(ride.id, ride.status, &outcome, entered_at)
        .await?
    {
        CasOutcome::Conflict => Err(ServiceError::Conflict),
        CasOutcome::Applied => {
            info!(
                ride = %ride.id,
                from = %ride.status,
                to = %outcome.new_status,
                actor = %principal.id,
                role = %principal.role,
                "ride transition applied"
            );
            sink.publish(&outcome.notification).await;

            let mut updated = ride;
            updated.status = outcome.new_status;
            if let Some(driver) = outcome.assigned_driver {
                updated.driver_id = Some(driver);
            }
            updated.timestamps.insert(outcome.new_status, entered_at);
            Ok(updated)
        }
    }
}
