//! Ride lifecycle decisions.
//!
//! One canonical transition table answers three questions for every
//! requested status change: is it legal, who may request it, and what
//! notification does it produce. `attempt_transition` is a pure decision
//! function; the caller applies the outcome with a conditional update
//! keyed on the prior status (see the api crate's store).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Principal, Ride, RideStatus, Role};

/// Destination statuses legally reachable from `from`. Forward transitions
/// only; self-transitions are never legal.
pub fn successors(from: RideStatus) -> &'static [RideStatus] {
    match from {
        RideStatus::Pending => &[RideStatus::Accepted, RideStatus::Cancelled],
        RideStatus::Accepted => &[RideStatus::InProgress, RideStatus::Cancelled],
        RideStatus::InProgress => &[RideStatus::Completed, RideStatus::Cancelled],
        RideStatus::Completed | RideStatus::Cancelled => &[],
    }
}

pub fn can_transition(from: RideStatus, to: RideStatus) -> bool {
    successors(from).contains(&to)
}

pub fn is_terminal(status: RideStatus) -> bool {
    successors(status).is_empty()
}

/// Why a requested transition was refused. All refusals are decision-time
/// and side-effect free; none are retriable as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a ride cannot move from {from} to {to}")]
    Invalid { from: RideStatus, to: RideStatus },

    #[error("{role} {principal_id} may not move a ride from {from} to {to}")]
    Unauthorized {
        from: RideStatus,
        to: RideStatus,
        role: Role,
        principal_id: Uuid,
    },

    #[error("ride is already {status}")]
    NoOp { status: RideStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RideAccepted,
    RideStarted,
    RideCompleted,
    RideCanceled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RideAccepted => "ride_accepted",
            NotificationKind::RideStarted => "ride_started",
            NotificationKind::RideCompleted => "ride_completed",
            NotificationKind::RideCanceled => "ride_canceled",
        }
    }
}

/// What to tell whom about an accepted transition. Exactly one per
/// transition; delivery is the sink's problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub target_user_id: Uuid,
    pub ride_id: Uuid,
    pub message: String,
    /// Only meaningful on `RideCompleted`: the rider has not rated yet.
    pub rateable: bool,
}

/// The full decision for an accepted transition. Nothing is mutated until
/// the caller applies this atomically against the prior status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub new_status: RideStatus,
    /// `Some` only for pending → accepted: the accepting driver.
    pub assigned_driver: Option<Uuid>,
    pub notification: Notification,
}

/// Decide a requested status change. Checks self-transition, table
/// legality, then authorization, in that order. Pure: no I/O, no clock,
/// no mutation of `ride`.
pub fn attempt_transition(
    ride: &Ride,
    requested: RideStatus,
    principal: Principal,
) -> Result<TransitionOutcome, TransitionError> {
    // Terminal states refuse everything, including re-requests of the
    // terminal status itself.
    if is_terminal(ride.status) {
        return Err(TransitionError::Invalid {
            from: ride.status,
            to: requested,
        });
    }
    if requested == ride.status {
        return Err(TransitionError::NoOp { status: ride.status });
    }
    if !can_transition(ride.status, requested) {
        return Err(TransitionError::Invalid {
            from: ride.status,
            to: requested,
        });
    }
    authorize(ride, requested, principal)?;

    let assigned_driver =
        (requested == RideStatus::Accepted).then_some(principal.id);

    Ok(TransitionOutcome {
        new_status: requested,
        assigned_driver,
        notification: notification_for(ride, requested, principal),
    })
}

fn authorize(
    ride: &Ride,
    requested: RideStatus,
    principal: Principal,
) -> Result<(), TransitionError> {
    let allowed = match (ride.status, requested) {
        // Any driver may claim a pending ride.
        (RideStatus::Pending, RideStatus::Accepted) => principal.role == Role::Driver,
        // Only the assigned driver moves the ride forward.
        (RideStatus::Accepted, RideStatus::InProgress)
        | (RideStatus::InProgress, RideStatus::Completed) => {
            Some(principal.id) == ride.driver_id
        }
        // Either party, or an admin, may cancel before completion.
        (_, RideStatus::Cancelled) => {
            principal.id == ride.rider_id
                || Some(principal.id) == ride.driver_id
                || principal.role == Role::Admin
        }
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(TransitionError::Unauthorized {
            from: ride.status,
            to: requested,
            role: principal.role,
            principal_id: principal.id,
        })
    }
}

fn notification_for(ride: &Ride, new_status: RideStatus, principal: Principal) -> Notification {
    match new_status {
        RideStatus::Accepted => Notification {
            kind: NotificationKind::RideAccepted,
            target_user_id: ride.rider_id,
            ride_id: ride.id,
            message: "A driver accepted your ride and is on the way.".to_string(),
            rateable: false,
        },
        RideStatus::InProgress => Notification {
            kind: NotificationKind::RideStarted,
            target_user_id: ride.rider_id,
            ride_id: ride.id,
            message: "Your ride is underway.".to_string(),
            rateable: false,
        },
        RideStatus::Completed => Notification {
            kind: NotificationKind::RideCompleted,
            target_user_id: ride.rider_id,
            ride_id: ride.id,
            message: "Your ride is complete. Thanks for riding!".to_string(),
            rateable: !ride.rider_rated,
        },
        RideStatus::Cancelled => {
            // Notify the other party. A rider cancelling tells the driver
            // (when one is assigned); a driver or admin cancelling tells
            // the rider.
            let rider_cancelled = principal.id == ride.rider_id;
            match (rider_cancelled, ride.driver_id) {
                (true, Some(driver)) => Notification {
                    kind: NotificationKind::RideCanceled,
                    target_user_id: driver,
                    ride_id: ride.id,
                    message: "The rider cancelled this ride.".to_string(),
                    rateable: false,
                },
                _ => Notification {
                    kind: NotificationKind::RideCanceled,
                    target_user_id: ride.rider_id,
                    ride_id: ride.id,
                    message: "Your ride was cancelled.".to_string(),
                    rateable: false,
                },
            }
        }
        // No edge in the transition table ends at pending.
        RideStatus::Pending => unreachable!("pending is never a transition destination"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    const ALL: [RideStatus; 5] = [
        RideStatus::Pending,
        RideStatus::Accepted,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    fn ride_in(status: RideStatus) -> Ride {
        let mut ride = Ride::request(
            Uuid::new_v4(),
            GeoPoint { lat: 44.98, lng: -93.26 },
            GeoPoint { lat: 44.95, lng: -93.09 },
        );
        ride.status = status;
        if status != RideStatus::Pending {
            ride.driver_id = Some(Uuid::new_v4());
        }
        ride
    }

    fn driver(id: Uuid) -> Principal {
        Principal { id, role: Role::Driver }
    }

    fn rider(id: Uuid) -> Principal {
        Principal { id, role: Role::Rider }
    }

    fn admin() -> Principal {
        Principal { id: Uuid::new_v4(), role: Role::Admin }
    }

    #[test]
    fn table_lists_only_forward_edges() {
        assert!(can_transition(RideStatus::Pending, RideStatus::Accepted));
        assert!(can_transition(RideStatus::Pending, RideStatus::Cancelled));
        assert!(can_transition(RideStatus::Accepted, RideStatus::InProgress));
        assert!(can_transition(RideStatus::Accepted, RideStatus::Cancelled));
        assert!(can_transition(RideStatus::InProgress, RideStatus::Completed));
        assert!(can_transition(RideStatus::InProgress, RideStatus::Cancelled));
        assert!(!can_transition(RideStatus::Pending, RideStatus::InProgress));
        assert!(!can_transition(RideStatus::Pending, RideStatus::Completed));
        assert!(!can_transition(RideStatus::Accepted, RideStatus::Completed));
        assert!(!can_transition(RideStatus::Completed, RideStatus::Cancelled));
    }

    #[test]
    fn every_pair_outside_the_table_is_invalid() {
        for from in ALL {
            for to in ALL {
                if to == from || can_transition(from, to) {
                    continue;
                }
                let ride = ride_in(from);
                // Admin so the refusal cannot be an authorization one.
                let err = attempt_transition(&ride, to, admin()).unwrap_err();
                assert_eq!(err, TransitionError::Invalid { from, to }, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states_refuse_every_request() {
        // Including a re-request of the terminal status itself: a second
        // cancel is invalid, not a no-op.
        for from in [RideStatus::Completed, RideStatus::Cancelled] {
            assert!(is_terminal(from));
            for to in ALL {
                let ride = ride_in(from);
                assert!(
                    matches!(
                        attempt_transition(&ride, to, admin()),
                        Err(TransitionError::Invalid { .. })
                    ),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn self_transition_is_a_noop_before_terminal() {
        for status in [RideStatus::Pending, RideStatus::Accepted, RideStatus::InProgress] {
            let ride = ride_in(status);
            assert_eq!(
                attempt_transition(&ride, status, admin()),
                Err(TransitionError::NoOp { status })
            );
        }
    }

    #[test]
    fn non_driver_cannot_accept() {
        let ride = ride_in(RideStatus::Pending);
        let principal = rider(Uuid::new_v4());
        let err = attempt_transition(&ride, RideStatus::Accepted, principal).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Unauthorized { role: Role::Rider, .. }
        ));
    }

    #[test]
    fn admin_cannot_accept_either() {
        let ride = ride_in(RideStatus::Pending);
        assert!(matches!(
            attempt_transition(&ride, RideStatus::Accepted, admin()),
            Err(TransitionError::Unauthorized { .. })
        ));
    }

    #[test]
    fn driver_accept_assigns_driver_and_notifies_rider() {
        let ride = ride_in(RideStatus::Pending);
        let d = Uuid::new_v4();
        let out = attempt_transition(&ride, RideStatus::Accepted, driver(d)).unwrap();
        assert_eq!(out.new_status, RideStatus::Accepted);
        assert_eq!(out.assigned_driver, Some(d));
        assert_eq!(out.notification.kind, NotificationKind::RideAccepted);
        assert_eq!(out.notification.target_user_id, ride.rider_id);
        assert_eq!(out.notification.ride_id, ride.id);
    }

    #[test]
    fn only_the_assigned_driver_starts_the_ride() {
        let ride = ride_in(RideStatus::Accepted);
        let assigned = ride.driver_id.unwrap();

        let other = driver(Uuid::new_v4());
        assert!(matches!(
            attempt_transition(&ride, RideStatus::InProgress, other),
            Err(TransitionError::Unauthorized { .. })
        ));

        let out = attempt_transition(&ride, RideStatus::InProgress, driver(assigned)).unwrap();
        assert_eq!(out.new_status, RideStatus::InProgress);
        assert_eq!(out.assigned_driver, None);
        assert_eq!(out.notification.kind, NotificationKind::RideStarted);
        assert_eq!(out.notification.target_user_id, ride.rider_id);
    }

    #[test]
    fn completion_notifies_rider_and_flags_rateable() {
        let mut ride = ride_in(RideStatus::InProgress);
        let assigned = ride.driver_id.unwrap();

        let out = attempt_transition(&ride, RideStatus::Completed, driver(assigned)).unwrap();
        assert_eq!(out.notification.kind, NotificationKind::RideCompleted);
        assert!(out.notification.rateable);

        ride.rider_rated = true;
        let out = attempt_transition(&ride, RideStatus::Completed, driver(assigned)).unwrap();
        assert!(!out.notification.rateable);
    }

    #[test]
    fn rider_cancel_notifies_driver() {
        let ride = ride_in(RideStatus::InProgress);
        let out =
            attempt_transition(&ride, RideStatus::Cancelled, rider(ride.rider_id)).unwrap();
        assert_eq!(out.notification.kind, NotificationKind::RideCanceled);
        assert_eq!(out.notification.target_user_id, ride.driver_id.unwrap());
    }

    #[test]
    fn driver_cancel_notifies_rider() {
        let ride = ride_in(RideStatus::Accepted);
        let assigned = ride.driver_id.unwrap();
        let out = attempt_transition(&ride, RideStatus::Cancelled, driver(assigned)).unwrap();
        assert_eq!(out.notification.target_user_id, ride.rider_id);
    }

    #[test]
    fn rider_cancel_without_driver_notifies_rider() {
        let mut ride = ride_in(RideStatus::Pending);
        ride.driver_id = None;
        let out =
            attempt_transition(&ride, RideStatus::Cancelled, rider(ride.rider_id)).unwrap();
        assert_eq!(out.notification.target_user_id, ride.rider_id);
    }

    #[test]
    fn admin_cancel_notifies_rider() {
        let ride = ride_in(RideStatus::Accepted);
        let out = attempt_transition(&ride, RideStatus::Cancelled, admin()).unwrap();
        assert_eq!(out.notification.target_user_id, ride.rider_id);
    }

    #[test]
    fn stranger_cannot_cancel() {
        let ride = ride_in(RideStatus::Accepted);
        let stranger = rider(Uuid::new_v4());
        assert!(matches!(
            attempt_transition(&ride, RideStatus::Cancelled, stranger),
            Err(TransitionError::Unauthorized { .. })
        ));
    }

    #[test]
    fn notification_kind_wire_names() {
        assert_eq!(NotificationKind::RideAccepted.as_str(), "ride_accepted");
        assert_eq!(NotificationKind::RideCanceled.as_str(), "ride_canceled");
        let json = serde_json::to_string(&NotificationKind::RideStarted).unwrap();
        assert_eq!(json, "\"ride_started\"");
    }
}
