pub mod account;
pub mod identity;
pub mod trip;
pub mod reservation;
pub mod capacity;
pub mod repository;
pub mod registry;
pub mod ledger;
pub mod memory;
pub mod summary;

pub use account::{AccountService, NewUser, PasswordChange, User};
pub use capacity::{CapacityReconciler, OverbookingPolicy};
pub use identity::{Principal, Role};
pub use ledger::ReservationLedger;
pub use memory::InMemoryStore;
pub use registry::TripRegistry;
pub use reservation::{Contact, NewReservation, Participant, Reservation};
pub use trip::{NewTrip, Trip, TripUpdate};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Not enough available spots: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },
    #[error("Capacity {capacity} is below the {committed} participants already booked")]
    CapacityBelowCommitted { capacity: i32, committed: i32 },
    #[error("Access denied: {0}")]
    Unauthorized(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
