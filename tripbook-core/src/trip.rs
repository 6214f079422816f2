use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// A bookable offering with a fixed capacity and date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub trip_date: NaiveDate,
    pub capacity: i32,
    pub available_spots: i32,
    pub active: bool,
    pub days: i32,
    pub price_cents: i64,
    /// Set when an admin shrank capacity below what is already booked and
    /// the over-booking policy chose to clamp instead of rejecting.
    pub overbooked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Build a fresh, active trip with every spot available.
    pub fn create(new: NewTrip) -> CoreResult<Self> {
        new.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            description: new.description,
            trip_date: new.trip_date,
            capacity: new.capacity,
            available_spots: new.capacity,
            active: true,
            days: new.days,
            price_cents: new.price_cents,
            overbooked: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Changes capacity, pulling `available_spots` down if it would exceed it.
    pub fn set_capacity(&mut self, capacity: i32) {
        self.capacity = capacity;
        if self.available_spots > capacity {
            self.available_spots = capacity;
        }
    }

    /// Sets available spots, never above capacity and never below zero.
    pub fn set_available_spots(&mut self, available: i32) {
        self.available_spots = available.clamp(0, self.capacity);
    }

    /// Copies the descriptive fields of an update. Capacity is left to the
    /// reconciler because it needs the committed participant count.
    pub fn apply_details(&mut self, update: &TripUpdate) {
        self.title = update.title.trim().to_string();
        self.description = update.description.clone();
        self.trip_date = update.trip_date;
        self.days = update.days;
        self.price_cents = update.price_cents;
        self.active = update.active;
        self.updated_at = Utc::now();
    }

    /// Price of a reservation for `participants` people.
    pub fn price_for(&self, participants: i32) -> CoreResult<i64> {
        self.price_cents
            .checked_mul(i64::from(participants))
            .ok_or_else(|| CoreError::ValidationError("total price overflows".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub title: String,
    pub description: Option<String>,
    pub trip_date: NaiveDate,
    pub capacity: i32,
    pub days: i32,
    pub price_cents: i64,
}

impl NewTrip {
    pub fn validate(&self) -> CoreResult<()> {
        validate_fields(
            &self.title,
            self.description.as_deref(),
            self.capacity,
            self.days,
            self.price_cents,
        )
    }
}

/// Full replacement of a trip's editable fields (admin edit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripUpdate {
    pub title: String,
    pub description: Option<String>,
    pub trip_date: NaiveDate,
    pub capacity: i32,
    pub days: i32,
    pub price_cents: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TripUpdate {
    pub fn validate(&self) -> CoreResult<()> {
        validate_fields(
            &self.title,
            self.description.as_deref(),
            self.capacity,
            self.days,
            self.price_cents,
        )
    }
}

fn validate_fields(
    title: &str,
    description: Option<&str>,
    capacity: i32,
    days: i32,
    price_cents: i64,
) -> CoreResult<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CoreError::ValidationError("title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::ValidationError(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    if description.map_or(false, |d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(CoreError::ValidationError(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    if capacity < 1 {
        return Err(CoreError::ValidationError("capacity must be at least 1".to_string()));
    }
    if days < 1 {
        return Err(CoreError::ValidationError("days must be at least 1".to_string()));
    }
    if price_cents < 0 {
        return Err(CoreError::ValidationError("price must not be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_trip(title: &str, capacity: i32) -> NewTrip {
        NewTrip {
            title: title.to_string(),
            description: Some("Old town, museums and a river cruise".to_string()),
            trip_date: NaiveDate::from_ymd_opt(2027, 5, 14).unwrap(),
            capacity,
            days: 5,
            price_cents: 120_000,
        }
    }

    #[test]
    fn test_create_starts_fully_available() {
        let trip = Trip::create(new_trip("Romantic Paris", 20)).unwrap();
        assert!(trip.active);
        assert!(!trip.overbooked);
        assert_eq!(trip.available_spots, 20);
    }

    #[test]
    fn test_validation() {
        assert!(Trip::create(new_trip("  ", 10)).is_err());
        assert!(Trip::create(new_trip("Zero capacity", 0)).is_err());

        let mut negative_price = new_trip("Cheap", 10);
        negative_price.price_cents = -1;
        assert!(matches!(
            Trip::create(negative_price),
            Err(CoreError::ValidationError(_))
        ));

        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(Trip::create(new_trip(&long_title, 10)).is_err());
    }

    #[test]
    fn test_capacity_change_clamps_available() {
        let mut trip = Trip::create(new_trip("Historic Rome", 15)).unwrap();
        trip.set_capacity(10);
        assert_eq!(trip.available_spots, 10);

        trip.set_available_spots(42);
        assert_eq!(trip.available_spots, 10);
        trip.set_available_spots(-3);
        assert_eq!(trip.available_spots, 0);
    }

    #[test]
    fn test_price_for_participants() {
        let trip = Trip::create(new_trip("Historic Rome", 15)).unwrap();
        assert_eq!(trip.price_for(3).unwrap(), 360_000);
    }
}
