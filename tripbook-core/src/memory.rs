use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::account::User;
use crate::capacity::CapacityReconciler;
use crate::repository::{ReservationRepository, TripRepository, UserRepository};
use crate::reservation::{NewReservation, Reservation};
use crate::trip::{Trip, TripUpdate};
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct MemoryState {
    trips: HashMap<Uuid, Trip>,
    reservations: HashMap<Uuid, Reservation>,
    users: HashMap<Uuid, User>,
}

impl MemoryState {
    fn committed(&self, trip_id: Uuid) -> i32 {
        self.reservations
            .values()
            .filter(|r| r.trip_id == trip_id && r.active)
            .map(|r| r.participant_count)
            .sum()
    }

    fn title_taken(&self, title: &str, except: Option<Uuid>) -> bool {
        self.trips
            .values()
            .any(|t| t.title == title && Some(t.id) != except)
    }
}

/// In-memory trip and reservation store.
///
/// Every operation holds one async mutex for its whole duration, which
/// stands in for the row lock the database store takes. Used by tests and
/// local runs without PostgreSQL.
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    reconciler: CapacityReconciler,
}

impl InMemoryStore {
    pub fn new(reconciler: CapacityReconciler) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            reconciler,
        }
    }

    /// Sum of participants over a trip's active reservations.
    pub async fn committed_participants(&self, trip_id: Uuid) -> i32 {
        self.state.lock().await.committed(trip_id)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(CapacityReconciler::default())
    }
}

#[async_trait]
impl TripRepository for InMemoryStore {
    async fn insert_trip(&self, trip: &Trip) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.title_taken(&trip.title, None) {
            return Err(CoreError::Conflict(format!("trip title '{}' already exists", trip.title)));
        }
        state.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn find_trip(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        Ok(self.state.lock().await.trips.get(&id).cloned())
    }

    async fn list_trips(&self, active_only: bool) -> CoreResult<Vec<Trip>> {
        let state = self.state.lock().await;
        let mut trips: Vec<Trip> = state
            .trips
            .values()
            .filter(|t| !active_only || t.active)
            .cloned()
            .collect();
        trips.sort_by(|a, b| a.trip_date.cmp(&b.trip_date).then_with(|| a.title.cmp(&b.title)));
        Ok(trips)
    }

    async fn update_trip(&self, id: Uuid, update: &TripUpdate) -> CoreResult<Trip> {
        let mut state = self.state.lock().await;
        if !state.trips.contains_key(&id) {
            return Err(CoreError::NotFound(format!("Trip {}", id)));
        }
        let title = update.title.trim();
        if state.title_taken(title, Some(id)) {
            return Err(CoreError::Conflict(format!("trip title '{}' already exists", title)));
        }
        let committed = state.committed(id);
        let stored = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", id)))?;

        // Work on a copy so a rejected recompute leaves the stored trip as is
        let mut trip = stored.clone();
        trip.apply_details(update);
        self.reconciler.recompute(&mut trip, update.capacity, committed)?;
        *stored = trip.clone();
        Ok(trip)
    }

    async fn reconcile_trip(&self, id: Uuid) -> CoreResult<Trip> {
        let mut state = self.state.lock().await;
        let committed = state.committed(id);
        let stored = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", id)))?;

        let mut trip = stored.clone();
        let capacity = trip.capacity;
        self.reconciler.recompute(&mut trip, capacity, committed)?;
        *stored = trip.clone();
        Ok(trip)
    }

    async fn deactivate_trip(&self, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let trip = state
            .trips
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", id)))?;
        trip.active = false;
        trip.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn create_reservation(
        &self,
        owner_id: &str,
        new: NewReservation,
    ) -> CoreResult<Reservation> {
        let mut state = self.state.lock().await;
        let trip_id = new.trip_id;
        let stored = state
            .trips
            .get_mut(&trip_id)
            .filter(|t| t.active)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", trip_id)))?;

        let mut trip = stored.clone();
        let reservation = Reservation::open(&trip, owner_id, new)?;
        self.reconciler.admit(&mut trip, reservation.participant_count)?;
        trip.updated_at = chrono::Utc::now();
        *stored = trip;

        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn list_for_trip(&self, trip_id: Uuid, active_only: bool) -> CoreResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.trip_id == trip_id && (!active_only || r.active))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn cancel_reservation(&self, id: Uuid) -> CoreResult<Reservation> {
        let mut state = self.state.lock().await;
        let mut reservation = state
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Reservation {}", id)))?;
        reservation.mark_cancelled()?;

        let committed_after = state.committed(reservation.trip_id) - reservation.participant_count;
        let trip = state
            .trips
            .get_mut(&reservation.trip_id)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", reservation.trip_id)))?;
        self.reconciler
            .release(trip, reservation.participant_count, committed_after);
        trip.updated_at = chrono::Utc::now();

        state.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| !active_only || u.active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| CoreError::NotFound(format!("Account {}", user.id)))?;
        stored.password_hash = user.password_hash.clone();
        stored.active = user.active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::tests::booking;
    use crate::trip::tests::new_trip;
    use std::sync::Arc;

    async fn store_with_trip(capacity: i32) -> (Arc<InMemoryStore>, Trip) {
        let store = Arc::new(InMemoryStore::default());
        let trip = Trip::create(new_trip("Lake Bled", capacity)).unwrap();
        store.insert_trip(&trip).await.unwrap();
        (store, trip)
    }

    #[tokio::test]
    async fn test_duplicate_title_conflicts() {
        let (store, _) = store_with_trip(5).await;
        let twin = Trip::create(new_trip("Lake Bled", 8)).unwrap();
        assert!(matches!(store.insert_trip(&twin).await, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_reservation_on_inactive_trip_is_not_found() {
        let (store, trip) = store_with_trip(5).await;
        store.deactivate_trip(trip.id).await.unwrap();

        let result = store.create_reservation("u-1", booking(trip.id, 1)).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_never_overbook() {
        let (store, trip) = store_with_trip(10).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let trip_id = trip.id;
            handles.push(tokio::spawn(async move {
                store.create_reservation(&format!("u-{}", i), booking(trip_id, 2)).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(CoreError::CapacityExceeded { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(admitted, 5);
        let stored = store.find_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.available_spots, 0);
        assert_eq!(store.committed_participants(trip.id).await, 10);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_trip_untouched() {
        let (store, trip) = store_with_trip(10).await;
        store.create_reservation("u-1", booking(trip.id, 5)).await.unwrap();

        let update = TripUpdate {
            title: "Lake Bled, winter edition".to_string(),
            description: None,
            trip_date: trip.trip_date,
            capacity: 3,
            days: 2,
            price_cents: 1,
            active: true,
        };
        let err = store.update_trip(trip.id, &update).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityBelowCommitted { .. }));

        let stored = store.find_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Lake Bled");
        assert_eq!(stored.capacity, 10);
        assert_eq!(stored.available_spots, 5);
    }

    #[tokio::test]
    async fn test_update_of_unknown_trip_is_not_found_even_with_taken_title() {
        let (store, _) = store_with_trip(10).await;

        let update = TripUpdate {
            title: "Lake Bled".to_string(),
            description: None,
            trip_date: chrono::NaiveDate::from_ymd_opt(2027, 5, 14).unwrap(),
            capacity: 4,
            days: 2,
            price_cents: 1,
            active: true,
        };
        let err = store.update_trip(Uuid::new_v4(), &update).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
