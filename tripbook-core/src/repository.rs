use async_trait::async_trait;
use uuid::Uuid;

use crate::account::User;
use crate::reservation::{NewReservation, Reservation};
use crate::trip::{Trip, TripUpdate};
use crate::CoreResult;

/// Repository trait for trip data access.
///
/// Mutating methods are atomic: implementations lock the trip for the whole
/// read-check-write sequence and run capacity changes through the
/// `CapacityReconciler` they were built with.
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Fails with `Conflict` if the title is taken.
    async fn insert_trip(&self, trip: &Trip) -> CoreResult<()>;

    async fn find_trip(&self, id: Uuid) -> CoreResult<Option<Trip>>;

    async fn list_trips(&self, active_only: bool) -> CoreResult<Vec<Trip>>;

    /// Replace editable fields and recompute available spots from the
    /// participant total of the trip's active reservations.
    async fn update_trip(&self, id: Uuid, update: &TripUpdate) -> CoreResult<Trip>;

    /// Recompute available spots with the current capacity.
    async fn reconcile_trip(&self, id: Uuid) -> CoreResult<Trip>;

    /// Soft delete.
    async fn deactivate_trip(&self, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for reservation data access
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Admit the participants on the trip and persist the reservation in one
    /// transaction. Missing or inactive trips are `NotFound`.
    async fn create_reservation(
        &self,
        owner_id: &str,
        new: NewReservation,
    ) -> CoreResult<Reservation>;

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>>;

    async fn list_for_trip(&self, trip_id: Uuid, active_only: bool) -> CoreResult<Vec<Reservation>>;

    /// Deactivate the reservation and credit its spots back to the trip in
    /// one transaction. A second cancel is a `Conflict`.
    async fn cancel_reservation(&self, id: Uuid) -> CoreResult<Reservation>;
}

/// Repository trait for account data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` if the email is taken.
    async fn insert_user(&self, user: &User) -> CoreResult<()>;

    async fn find_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    /// `email` is matched in its normalized, lower-case form.
    async fn find_user_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<User>>;

    /// Persist the password hash and active flag. `NotFound` if missing.
    async fn save_user(&self, user: &User) -> CoreResult<()>;
}
