use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::trip::Trip;
use crate::{CoreError, CoreResult};

/// What to do when an admin edit leaves fewer seats than are already booked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverbookingPolicy {
    /// Refuse the edit and leave the trip untouched.
    #[default]
    Reject,
    /// Accept the edit, pin available spots at zero and flag the trip.
    ClampAndFlag,
}

/// Keeps `Trip::available_spots` equal to unreserved capacity.
///
/// Stateless; every method mutates the trip it is handed. Callers are
/// responsible for running each call inside the same transaction as the
/// reservation write it accompanies, with the trip row locked.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityReconciler {
    policy: OverbookingPolicy,
}

impl CapacityReconciler {
    pub fn new(policy: OverbookingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverbookingPolicy {
        self.policy
    }

    /// Take `requested` spots for a new reservation.
    pub fn admit(&self, trip: &mut Trip, requested: i32) -> CoreResult<()> {
        if requested < 1 {
            return Err(CoreError::ValidationError(
                "at least one participant is required".to_string(),
            ));
        }
        if requested > trip.available_spots {
            warn!(
                trip_id = %trip.id,
                requested,
                available = trip.available_spots,
                "booking rejected, not enough spots"
            );
            return Err(CoreError::CapacityExceeded {
                requested,
                available: trip.available_spots,
            });
        }
        trip.set_available_spots(trip.available_spots - requested);
        Ok(())
    }

    /// Give back `released` spots of a cancelled reservation.
    ///
    /// `committed_after` is the participant total of the trip's active
    /// reservations once the cancellation is applied; it is only consulted
    /// while the trip is flagged over-booked, when a plain delta would hand
    /// out seats that do not exist.
    pub fn release(&self, trip: &mut Trip, released: i32, committed_after: i32) {
        if trip.overbooked {
            let available = trip.capacity - committed_after;
            trip.overbooked = available < 0;
            trip.set_available_spots(available);
        } else {
            trip.set_available_spots(trip.available_spots + released);
        }
    }

    /// Recompute available spots from the live committed total instead of
    /// trusting the stored counter. Corrects any earlier drift.
    pub fn recompute(&self, trip: &mut Trip, capacity: i32, committed: i32) -> CoreResult<()> {
        if capacity < 1 {
            return Err(CoreError::ValidationError("capacity must be at least 1".to_string()));
        }
        let available = capacity - committed;
        if available < 0 {
            match self.policy {
                OverbookingPolicy::Reject => {
                    return Err(CoreError::CapacityBelowCommitted { capacity, committed });
                }
                OverbookingPolicy::ClampAndFlag => {
                    warn!(
                        trip_id = %trip.id,
                        capacity,
                        committed,
                        "trip is over-booked after capacity change"
                    );
                    trip.set_capacity(capacity);
                    trip.set_available_spots(0);
                    trip.overbooked = true;
                    return Ok(());
                }
            }
        }
        trip.set_capacity(capacity);
        trip.set_available_spots(available);
        trip.overbooked = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::tests::new_trip;

    fn trip(capacity: i32) -> Trip {
        Trip::create(new_trip("Tatra Mountains", capacity)).unwrap()
    }

    #[test]
    fn test_admit_and_release() {
        let reconciler = CapacityReconciler::default();
        let mut trip = trip(2);

        // Fill the trip
        reconciler.admit(&mut trip, 2).unwrap();
        assert_eq!(trip.available_spots, 0);

        // One more does not fit and changes nothing
        let err = reconciler.admit(&mut trip, 1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CapacityExceeded { requested: 1, available: 0 }
        ));
        assert_eq!(trip.available_spots, 0);

        // Cancelling gives the seats back
        reconciler.release(&mut trip, 2, 0);
        assert_eq!(trip.available_spots, 2);
    }

    #[test]
    fn test_release_never_exceeds_capacity() {
        let reconciler = CapacityReconciler::default();
        let mut trip = trip(4);
        reconciler.release(&mut trip, 3, 0);
        assert_eq!(trip.available_spots, 4);
    }

    #[test]
    fn test_recompute_heals_drift() {
        let reconciler = CapacityReconciler::default();
        let mut trip = trip(10);
        // Stored counter drifted away from the 4 committed participants
        trip.available_spots = 9;

        reconciler.recompute(&mut trip, 12, 4).unwrap();
        assert_eq!(trip.capacity, 12);
        assert_eq!(trip.available_spots, 8);
    }

    #[test]
    fn test_shrink_below_committed_rejected() {
        let reconciler = CapacityReconciler::new(OverbookingPolicy::Reject);
        let mut trip = trip(10);
        reconciler.admit(&mut trip, 5).unwrap();

        let err = reconciler.recompute(&mut trip, 3, 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CapacityBelowCommitted { capacity: 3, committed: 5 }
        ));
        assert_eq!(trip.capacity, 10);
        assert_eq!(trip.available_spots, 5);
        assert!(!trip.overbooked);
    }

    #[test]
    fn test_shrink_below_committed_clamped_and_flagged() {
        let reconciler = CapacityReconciler::new(OverbookingPolicy::ClampAndFlag);
        let mut trip = trip(10);
        reconciler.admit(&mut trip, 5).unwrap();

        reconciler.recompute(&mut trip, 3, 5).unwrap();
        assert_eq!(trip.capacity, 3);
        assert_eq!(trip.available_spots, 0);
        assert!(trip.overbooked);

        // Still over-booked: 4 committed on 3 seats
        reconciler.release(&mut trip, 1, 4);
        assert_eq!(trip.available_spots, 0);
        assert!(trip.overbooked);

        // Back within capacity, counter follows the live total
        reconciler.release(&mut trip, 2, 2);
        assert_eq!(trip.available_spots, 1);
        assert!(!trip.overbooked);
    }
}
