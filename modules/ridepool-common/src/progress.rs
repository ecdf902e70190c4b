//! Progress view model.
//!
//! A pure derivation from a ride's status and timestamps to an ordered
//! list of display steps. Rendering layers consume this uniformly instead
//! of re-implementing status switches.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Ride, RideStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStep {
    pub status: RideStatus,
    pub label: &'static str,
    pub description: &'static str,
    pub is_completed: bool,
    pub is_current: bool,
    pub is_future: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Derive the ordered step list for a ride. The four forward statuses
/// always appear; a `Cancelled` step is appended only when the ride was
/// actually cancelled. Identical input produces identical output.
pub fn derive_view_model(ride: &Ride) -> Vec<ProgressStep> {
    let cancelled = ride.status == RideStatus::Cancelled;

    let mut steps = Vec::with_capacity(5);
    for (pos, status) in RideStatus::FORWARD_ORDER.into_iter().enumerate() {
        let (is_completed, is_current) = if cancelled {
            // Forward steps the ride actually passed stay marked done;
            // the cancelled step below is the current one.
            (ride.timestamps.contains_key(&status), false)
        } else {
            let current = ride
                .status
                .forward_position()
                .unwrap_or(usize::MAX);
            (pos < current, pos == current)
        };
        steps.push(ProgressStep {
            status,
            label: status.label(),
            description: status.describe(),
            is_completed,
            is_current,
            is_future: !is_completed && !is_current,
            timestamp: ride.entered_at(status),
        });
    }

    if cancelled {
        steps.push(ProgressStep {
            status: RideStatus::Cancelled,
            label: RideStatus::Cancelled.label(),
            description: RideStatus::Cancelled.describe(),
            is_completed: false,
            is_current: true,
            is_future: false,
            timestamp: ride.entered_at(RideStatus::Cancelled),
        });
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use uuid::Uuid;

    fn ride() -> Ride {
        Ride::request(
            Uuid::new_v4(),
            GeoPoint { lat: 44.98, lng: -93.26 },
            GeoPoint { lat: 44.95, lng: -93.09 },
        )
    }

    fn advance(ride: &mut Ride, status: RideStatus) {
        ride.status = status;
        ride.timestamps.insert(status, Utc::now());
    }

    #[test]
    fn pending_ride_has_current_first_step() {
        let steps = derive_view_model(&ride());
        assert_eq!(steps.len(), 4);
        assert!(steps[0].is_current);
        assert!(steps[0].timestamp.is_some());
        assert!(steps[1..].iter().all(|s| s.is_future && s.timestamp.is_none()));
    }

    #[test]
    fn in_progress_marks_passed_steps_completed() {
        let mut r = ride();
        advance(&mut r, RideStatus::Accepted);
        advance(&mut r, RideStatus::InProgress);

        let steps = derive_view_model(&r);
        assert_eq!(steps.len(), 4);
        assert!(steps[0].is_completed && !steps[0].is_current);
        assert!(steps[1].is_completed && !steps[1].is_current);
        assert!(steps[2].is_current && !steps[2].is_completed);
        assert!(steps[3].is_future);
        assert!(!steps.iter().any(|s| s.status == RideStatus::Cancelled));
    }

    #[test]
    fn completed_ride_ends_on_current_last_step() {
        let mut r = ride();
        advance(&mut r, RideStatus::Accepted);
        advance(&mut r, RideStatus::InProgress);
        advance(&mut r, RideStatus::Completed);

        let steps = derive_view_model(&r);
        assert!(steps[..3].iter().all(|s| s.is_completed));
        assert!(steps[3].is_current);
    }

    #[test]
    fn cancelled_ride_appends_cancelled_step() {
        let mut r = ride();
        advance(&mut r, RideStatus::Accepted);
        advance(&mut r, RideStatus::Cancelled);

        let steps = derive_view_model(&r);
        assert_eq!(steps.len(), 5);
        // Forward steps actually passed stay completed.
        assert!(steps[0].is_completed);
        assert!(steps[1].is_completed);
        assert!(steps[2].is_future && steps[3].is_future);
        let last = &steps[4];
        assert_eq!(last.status, RideStatus::Cancelled);
        assert!(last.is_current);
        assert!(last.timestamp.is_some());
    }

    #[test]
    fn derivation_is_deterministic() {
        let mut r = ride();
        advance(&mut r, RideStatus::Accepted);
        assert_eq!(derive_view_model(&r), derive_view_model(&r));
    }
}
