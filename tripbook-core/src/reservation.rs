use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tripbook_shared::Masked;
use uuid::Uuid;

use crate::trip::Trip;
use crate::{CoreError, CoreResult};

/// Person who made the booking and is contacted about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub name: String,
    pub surname: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// A named person counted in a reservation. Lives and dies with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub trip_id: Uuid,
    pub contact: Contact,
    pub participants: Vec<Participant>,
}

impl NewReservation {
    pub fn validate(&self) -> CoreResult<()> {
        let c = &self.contact;
        if c.name.trim().is_empty() || c.surname.trim().is_empty() {
            return Err(CoreError::ValidationError("contact name and surname are required".to_string()));
        }
        if !looks_like_email(c.email.expose()) {
            return Err(CoreError::ValidationError("contact email is invalid".to_string()));
        }
        if c.phone.expose().trim().is_empty() {
            return Err(CoreError::ValidationError("contact phone is required".to_string()));
        }
        if self.participants.is_empty() {
            return Err(CoreError::ValidationError("at least one participant is required".to_string()));
        }
        if self
            .participants
            .iter()
            .any(|p| p.name.trim().is_empty() || p.surname.trim().is_empty())
        {
            return Err(CoreError::ValidationError("participant name and surname are required".to_string()));
        }
        self.participant_count().map(|_| ())
    }

    pub fn participant_count(&self) -> CoreResult<i32> {
        i32::try_from(self.participants.len())
            .map_err(|_| CoreError::ValidationError("too many participants".to_string()))
    }
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// A booking against one trip. Immutable once created apart from the
/// soft-cancel marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub owner_id: String,
    pub contact: Contact,
    pub participants: Vec<Participant>,
    pub participant_count: i32,
    pub total_price_cents: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Prices the request against the trip as it is right now; the total
    /// stays fixed afterwards even if the trip price changes.
    pub fn open(trip: &Trip, owner_id: &str, new: NewReservation) -> CoreResult<Self> {
        let participant_count = new.participant_count()?;
        let total_price_cents = trip.price_for(participant_count)?;
        Ok(Self {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            owner_id: owner_id.to_string(),
            contact: new.contact,
            participants: new.participants,
            participant_count,
            total_price_cents,
            active: true,
            created_at: Utc::now(),
            cancelled_at: None,
        })
    }

    pub fn mark_cancelled(&mut self) -> CoreResult<()> {
        if !self.active {
            return Err(CoreError::Conflict(format!(
                "reservation {} is already cancelled",
                self.id
            )));
        }
        self.active = false;
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }
}
