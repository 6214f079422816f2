use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::identity::Principal;
use crate::repository::{ReservationRepository, TripRepository};
use crate::reservation::{NewReservation, Reservation};
use crate::summary::ReservationSummary;
use crate::trip::Trip;
use crate::{CoreError, CoreResult};

/// Booking, lookup and cancellation of reservations.
///
/// The acting principal is always an explicit argument.
#[derive(Clone)]
pub struct ReservationLedger {
    reservations: Arc<dyn ReservationRepository>,
    trips: Arc<dyn TripRepository>,
}

impl ReservationLedger {
    pub fn new(reservations: Arc<dyn ReservationRepository>, trips: Arc<dyn TripRepository>) -> Self {
        Self { reservations, trips }
    }

    pub async fn create(&self, principal: &Principal, new: NewReservation) -> CoreResult<Reservation> {
        new.validate()?;
        debug!(trip_id = %new.trip_id, contact = ?new.contact, "booking requested");

        let reservation = self.reservations.create_reservation(&principal.id, new).await?;
        info!(
            reservation_id = %reservation.id,
            trip_id = %reservation.trip_id,
            participants = reservation.participant_count,
            owner = %principal.id,
            "reservation created"
        );
        Ok(reservation)
    }

    pub async fn get(&self, id: Uuid, principal: &Principal) -> CoreResult<Reservation> {
        let reservation = self.find(id).await?;
        if !principal.can_act_for(&reservation.owner_id) {
            return Err(CoreError::Unauthorized("you can only view your own reservations".to_string()));
        }
        Ok(reservation)
    }

    /// Admins get every reservation of the trip, users only their own.
    pub async fn list_for_trip(
        &self,
        principal: &Principal,
        trip_id: Uuid,
        active_only: bool,
    ) -> CoreResult<Vec<Reservation>> {
        if self.trips.find_trip(trip_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Trip {}", trip_id)));
        }
        let reservations = self.reservations.list_for_trip(trip_id, active_only).await?;
        Ok(reservations
            .into_iter()
            .filter(|r| principal.can_act_for(&r.owner_id))
            .collect())
    }

    /// Only the owner or an admin may cancel. Spots go back to the trip once.
    pub async fn cancel(&self, id: Uuid, principal: &Principal) -> CoreResult<()> {
        let reservation = self.find(id).await?;
        if !principal.can_act_for(&reservation.owner_id) {
            return Err(CoreError::Unauthorized("you can only cancel your own reservations".to_string()));
        }

        let cancelled = self.reservations.cancel_reservation(id).await?;
        info!(
            reservation_id = %cancelled.id,
            trip_id = %cancelled.trip_id,
            released = cancelled.participant_count,
            by = %principal.id,
            "reservation cancelled"
        );
        Ok(())
    }

    /// Printable summary of a reservation and its trip.
    pub async fn summary(&self, id: Uuid, principal: &Principal) -> CoreResult<Vec<u8>> {
        let (trip, reservation) = self.with_trip(id, principal).await?;
        Ok(ReservationSummary::new(&trip, &reservation).render().into_bytes())
    }

    /// The summary as a PDF document.
    pub async fn pdf(&self, id: Uuid, principal: &Principal) -> CoreResult<Vec<u8>> {
        let (trip, reservation) = self.with_trip(id, principal).await?;
        ReservationSummary::new(&trip, &reservation).render_pdf()
    }

    async fn with_trip(&self, id: Uuid, principal: &Principal) -> CoreResult<(Trip, Reservation)> {
        let reservation = self.get(id, principal).await?;
        let trip = self
            .trips
            .find_trip(reservation.trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", reservation.trip_id)))?;
        Ok((trip, reservation))
    }

    async fn find(&self, id: Uuid) -> CoreResult<Reservation> {
        self.reservations
            .find_reservation(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{CapacityReconciler, OverbookingPolicy};
    use crate::identity::Role;
    use crate::memory::InMemoryStore;
    use crate::registry::TripRegistry;
    use crate::reservation::tests::booking;
    use crate::trip::tests::new_trip;
    use crate::trip::{Trip, TripUpdate};

    struct Fixture {
        store: Arc<InMemoryStore>,
        ledger: ReservationLedger,
        registry: TripRegistry,
    }

    fn fixture(policy: OverbookingPolicy) -> Fixture {
        let store = Arc::new(InMemoryStore::new(CapacityReconciler::new(policy)));
        Fixture {
            ledger: ReservationLedger::new(store.clone(), store.clone()),
            registry: TripRegistry::new(store.clone()),
            store,
        }
    }

    fn admin() -> Principal {
        Principal::new("admin-1", "admin@example.com", Role::Admin)
    }

    fn user(id: &str) -> Principal {
        Principal::new(id, format!("{}@example.com", id), Role::User)
    }

    async fn available(f: &Fixture, trip: &Trip) -> i32 {
        f.registry.get(trip.id).await.unwrap().available_spots
    }

    #[tokio::test]
    async fn test_fill_reject_cancel_scenario() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Tatra Mountains", 2)).await.unwrap();
        let alice = user("alice");

        // Reserve both spots
        let first = f.ledger.create(&alice, booking(trip.id, 2)).await.unwrap();
        assert_eq!(available(&f, &trip).await, 0);

        // One more does not fit
        let err = f.ledger.create(&alice, booking(trip.id, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { requested: 1, available: 0 }));
        assert_eq!(available(&f, &trip).await, 0);

        // Cancel the first reservation
        f.ledger.cancel(first.id, &alice).await.unwrap();
        assert_eq!(available(&f, &trip).await, 2);
    }

    #[tokio::test]
    async fn test_cancel_credits_once() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Historic Rome", 10)).await.unwrap();
        let bob = user("bob");

        let reservation = f.ledger.create(&bob, booking(trip.id, 3)).await.unwrap();
        assert_eq!(available(&f, &trip).await, 7);

        f.ledger.cancel(reservation.id, &bob).await.unwrap();
        assert_eq!(available(&f, &trip).await, 10);

        let err = f.ledger.cancel(reservation.id, &bob).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(available(&f, &trip).await, 10);
        assert!(!f.ledger.get(reservation.id, &bob).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_may_cancel() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Historic Rome", 10)).await.unwrap();
        let owner = user("owner");
        let intruder = user("intruder");

        let reservation = f.ledger.create(&owner, booking(trip.id, 2)).await.unwrap();

        let err = f.ledger.cancel(reservation.id, &intruder).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert_eq!(available(&f, &trip).await, 8);

        f.ledger.cancel(reservation.id, &admin()).await.unwrap();
        assert_eq!(available(&f, &trip).await, 10);
    }

    #[tokio::test]
    async fn test_missing_trip_and_reservation() {
        let f = fixture(OverbookingPolicy::Reject);
        let carol = user("carol");

        let err = f.ledger.create(&carol, booking(Uuid::new_v4(), 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let err = f.ledger.cancel(Uuid::new_v4(), &carol).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_respects_ownership() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Lake Bled", 10)).await.unwrap();
        let dave = user("dave");
        let erin = user("erin");

        let cancelled = f.ledger.create(&dave, booking(trip.id, 1)).await.unwrap();
        f.ledger.create(&dave, booking(trip.id, 2)).await.unwrap();
        f.ledger.create(&erin, booking(trip.id, 3)).await.unwrap();
        f.ledger.cancel(cancelled.id, &dave).await.unwrap();

        assert_eq!(f.ledger.list_for_trip(&dave, trip.id, true).await.unwrap().len(), 1);
        assert_eq!(f.ledger.list_for_trip(&dave, trip.id, false).await.unwrap().len(), 2);
        assert_eq!(f.ledger.list_for_trip(&admin(), trip.id, true).await.unwrap().len(), 2);
        assert_eq!(f.ledger.list_for_trip(&admin(), trip.id, false).await.unwrap().len(), 3);

        let err = f.ledger.get(cancelled.id, &erin).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_available_matches_committed_after_mixed_operations() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Lake Bled", 12)).await.unwrap();
        let frank = user("frank");

        let mut ids = Vec::new();
        for people in [1, 4, 2, 3] {
            ids.push(f.ledger.create(&frank, booking(trip.id, people)).await.unwrap().id);
        }
        f.ledger.cancel(ids[1], &frank).await.unwrap();
        f.ledger.cancel(ids[3], &admin()).await.unwrap();

        let stored = f.registry.get(trip.id).await.unwrap();
        let committed = f.store.committed_participants(trip.id).await;
        assert_eq!(committed, 3);
        assert_eq!(stored.available_spots, stored.capacity - committed);
    }

    fn shrink_to(trip: &Trip, capacity: i32) -> TripUpdate {
        TripUpdate {
            title: trip.title.clone(),
            description: trip.description.clone(),
            trip_date: trip.trip_date,
            capacity,
            days: trip.days,
            price_cents: trip.price_cents,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_admin_shrink_below_bookings_rejected() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Historic Rome", 10)).await.unwrap();
        f.ledger.create(&user("gina"), booking(trip.id, 2)).await.unwrap();
        f.ledger.create(&user("hank"), booking(trip.id, 3)).await.unwrap();

        let err = f.registry.update(&admin(), trip.id, shrink_to(&trip, 3)).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityBelowCommitted { capacity: 3, committed: 5 }));

        let stored = f.registry.get(trip.id).await.unwrap();
        assert_eq!((stored.capacity, stored.available_spots), (10, 5));
    }

    #[tokio::test]
    async fn test_admin_shrink_below_bookings_clamped_and_flagged() {
        let f = fixture(OverbookingPolicy::ClampAndFlag);
        let trip = f.registry.create(&admin(), new_trip("Historic Rome", 10)).await.unwrap();
        let gina = user("gina");
        let first = f.ledger.create(&gina, booking(trip.id, 2)).await.unwrap();
        f.ledger.create(&user("hank"), booking(trip.id, 3)).await.unwrap();

        let updated = f.registry.update(&admin(), trip.id, shrink_to(&trip, 3)).await.unwrap();
        assert_eq!((updated.capacity, updated.available_spots), (3, 0));
        assert!(updated.overbooked);

        // Nothing can be booked while over-booked
        let err = f.ledger.create(&gina, booking(trip.id, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExceeded { .. }));

        // Cancelling 2 leaves 3 committed on 3 seats
        f.ledger.cancel(first.id, &gina).await.unwrap();
        let stored = f.registry.get(trip.id).await.unwrap();
        assert_eq!(stored.available_spots, 0);
        assert!(!stored.overbooked);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_counter() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Lake Bled", 10)).await.unwrap();
        f.ledger.create(&user("ivan"), booking(trip.id, 4)).await.unwrap();

        let reconciled = f.registry.reconcile(&admin(), trip.id).await.unwrap();
        assert_eq!(reconciled.available_spots, 6);

        let err = f.registry.reconcile(&user("ivan"), trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_summary_lists_participants() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Lake Bled", 10)).await.unwrap();
        let judy = user("judy");
        let reservation = f.ledger.create(&judy, booking(trip.id, 2)).await.unwrap();

        let bytes = f.ledger.summary(reservation.id, &judy).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Lake Bled"));
        assert!(text.contains("Guest2"));
        assert!(text.contains("anna.nowak@example.com"));
    }

    #[tokio::test]
    async fn test_pdf_restricted_to_owner() {
        let f = fixture(OverbookingPolicy::Reject);
        let trip = f.registry.create(&admin(), new_trip("Lake Bled", 10)).await.unwrap();
        let judy = user("judy");
        let reservation = f.ledger.create(&judy, booking(trip.id, 1)).await.unwrap();

        let pdf = f.ledger.pdf(reservation.id, &judy).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let err = f.ledger.pdf(reservation.id, &user("mallory")).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }
}
