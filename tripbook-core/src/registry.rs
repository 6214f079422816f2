use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::identity::Principal;
use crate::repository::TripRepository;
use crate::trip::{NewTrip, Trip, TripUpdate};
use crate::{CoreError, CoreResult};

/// Trip CRUD. Writes are admin-only; reads are public.
#[derive(Clone)]
pub struct TripRegistry {
    trips: Arc<dyn TripRepository>,
}

impl TripRegistry {
    pub fn new(trips: Arc<dyn TripRepository>) -> Self {
        Self { trips }
    }

    pub async fn create(&self, principal: &Principal, new: NewTrip) -> CoreResult<Trip> {
        principal.require_admin("create trips")?;
        let trip = Trip::create(new)?;
        self.trips.insert_trip(&trip).await?;
        info!(trip_id = %trip.id, title = %trip.title, capacity = trip.capacity, "trip created");
        Ok(trip)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Trip> {
        self.trips
            .find_trip(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Trip {}", id)))
    }

    pub async fn list(&self, active_only: bool) -> CoreResult<Vec<Trip>> {
        self.trips.list_trips(active_only).await
    }

    /// Admin edit. Available spots are recomputed from live reservations,
    /// never shifted by a delta.
    pub async fn update(&self, principal: &Principal, id: Uuid, update: TripUpdate) -> CoreResult<Trip> {
        principal.require_admin("edit trips")?;
        update.validate()?;
        let trip = self.trips.update_trip(id, &update).await?;
        info!(
            trip_id = %trip.id,
            capacity = trip.capacity,
            available = trip.available_spots,
            overbooked = trip.overbooked,
            "trip updated"
        );
        Ok(trip)
    }

    pub async fn deactivate(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        principal.require_admin("delete trips")?;
        self.trips.deactivate_trip(id).await?;
        info!(trip_id = %id, "trip deactivated");
        Ok(())
    }

    pub async fn reconcile(&self, principal: &Principal, id: Uuid) -> CoreResult<Trip> {
        principal.require_admin("reconcile trips")?;
        let trip = self.trips.reconcile_trip(id).await?;
        info!(trip_id = %trip.id, available = trip.available_spots, "trip reconciled");
        Ok(trip)
    }
}
